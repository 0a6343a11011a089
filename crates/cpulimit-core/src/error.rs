use thiserror::Error;

use crate::cgroups::CfsError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CFS error: {0}")]
    Cfs(#[from] CfsError),

    #[error("Invalid bandwidth: {0:?} (expected millicores like \"500m\" or cores like \"0.5\")")]
    InvalidBandwidth(String),
}

pub type Result<T> = std::result::Result<T, Error>;
