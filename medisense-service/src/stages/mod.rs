pub mod analyze_image;
pub mod translate_report;

pub use analyze_image::{ANALYZE_IMAGE_STAGE, AnalyzeImageStage};
pub use translate_report::{TRANSLATE_REPORT_STAGE, TranslateReportStage};
