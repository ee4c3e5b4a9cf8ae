mod bridge;
mod cli;
