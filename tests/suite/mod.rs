mod concurrency;
mod contract;
mod service;
