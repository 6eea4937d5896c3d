pub mod yaml_loader;

pub use yaml_loader::{dump_tests_to_yaml, load_spec_from_file, save_spec_to_file};
