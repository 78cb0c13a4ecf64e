use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("storage id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
    },
    #[snafu(display("thread '{id}' does not exist"))]
    ThreadNotFound { stage: &'static str, id: String },
    #[snafu(display("storage conflict for '{entity}' with id '{id}': {details}"))]
    Conflict {
        stage: &'static str,
        entity: &'static str,
        id: String,
        details: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
