pub mod anchor_file;

pub use anchor_file::{
    AnchorFileOperation, AnchorFileOperationRequest, AnchorFileOperationResult, SelectedFile,
};
