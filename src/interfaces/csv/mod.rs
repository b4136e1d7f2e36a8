pub mod account_reader;
pub mod statement_writer;
