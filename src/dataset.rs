pub mod annotation;
pub mod augment;
pub mod classes;
pub mod loader;
pub mod tensor;
pub mod transform;
pub mod voc;
