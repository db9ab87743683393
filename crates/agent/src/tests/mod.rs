mod retrieval;
mod support;
