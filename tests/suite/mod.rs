mod batch;
mod cli;
