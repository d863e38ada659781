mod batch;
mod settings;
