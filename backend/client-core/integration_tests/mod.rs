mod helpers;

mod chat;
mod discovery;
mod notify;
mod session;
mod sync;
