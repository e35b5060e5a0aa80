// Resume analysis: the seven-stage pipeline and the record it maintains.
// Every platform call goes through the client slices; nothing here touches a
// `Platform` directly.

pub mod convert;
pub mod pipeline;
pub mod prompts;
pub mod record;

pub use convert::{DocumentConverter, IdSource, PdftoppmConverter, RandomIds};
pub use pipeline::{AnalysisPipeline, AnalysisRequest, Progress, StageError};
pub use record::{list_resumes, load_resume, Feedback, FeedbackDocument, ResumeRecord};
