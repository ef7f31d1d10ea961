pub mod run;
pub mod scan;
pub mod status;
pub mod upload;
