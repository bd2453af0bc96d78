use analysis_dispatch_core::DispatchError;

use crate::adapters::catalog::CatalogError;
use crate::adapters::job_store::StoreError;
use crate::adapters::ledger::LedgerError;
use crate::sources::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
