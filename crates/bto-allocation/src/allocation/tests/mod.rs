mod catalogue;
mod common;
