pub mod error;
pub mod ids;

pub use error::{CoordError, CoordResult};
pub use ids::{PaperNumber, Question, QuestionVersion, TaskRef, Username, Version};
