pub mod serialization;
pub mod visualization;

pub use serialization::{load_annotated_documents, save_annotated_documents, write_json};
pub use visualization::render_visualization;
