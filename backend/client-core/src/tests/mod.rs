mod cache;
mod chat;
mod protocol;
