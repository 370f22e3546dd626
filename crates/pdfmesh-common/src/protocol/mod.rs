pub mod error;
pub mod responses;
pub mod service;
pub mod types;


pub use error::{PdfMeshError, Result};
pub use responses::{ErrorResponse, ProcessingResponse, UploadResponse, UploadedFile};
pub use service::{HealthReport, ServiceDescriptor, ServiceId};
pub use types::{OperationType, ServiceStatus};
