pub mod structure_cache;
