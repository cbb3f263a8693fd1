mod cascade;
mod detach;
mod executor;
mod nullify;

pub use executor::CascadeExecutor;
