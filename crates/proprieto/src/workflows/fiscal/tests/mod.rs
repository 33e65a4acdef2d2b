mod common;
mod normalizer;
mod ownership;
