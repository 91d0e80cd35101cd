//! Optimistic favorite/status writes.
//!
//! Each operation commits the change to the shared [`MetadataStore`] right
//! away, reports success, and only then runs the remote call on a spawned
//! task. If that call fails the task puts the previous value back and reports
//! the failure. Rows without a backend id are created on first meaningful
//! change; their new id is written back so the next rebuild shows it.
//!
//! [`MetadataStore`]: crate::metadata::MetadataStore

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::CalouroApi;
use crate::error::ApiError;
use crate::key::CompositeKey;
use crate::metadata::SharedMetadata;
use crate::models::{CalouroStatus, NewCalouro};
use crate::view::{StudentId, StudentViewModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A single field change on one calouro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Favorite(bool),
    Status(CalouroStatus),
}

impl Change {
    /// Whether this is the value an unpersisted row already has.
    fn is_default(self) -> bool {
        match self {
            Change::Favorite(favorited) => !favorited,
            Change::Status(status) => status == CalouroStatus::Pending,
        }
    }

    /// Writes the change and returns the change that undoes it.
    fn apply(self, store: &SharedMetadata, key: &CompositeKey) -> Change {
        let mut store = store.lock();
        match self {
            Change::Favorite(favorited) => Change::Favorite(store.set_favorite(key, favorited)),
            Change::Status(status) => Change::Status(store.set_status(key, status)),
        }
    }

    async fn send(self, api: &dyn CalouroApi, id: u64) -> Result<(), ApiError> {
        match self {
            Change::Favorite(favorited) => api.update_favorite(id, favorited).await,
            Change::Status(status) => api.update_status(id, status).await,
        }
    }
}

/// Remote call a change needs, decided from the row's identity.
#[derive(Debug, Clone, PartialEq)]
enum RemoteWrite {
    Update(u64, Change),
    Create(NewCalouro),
}

pub struct MutationCoordinator {
    api: Arc<dyn CalouroApi>,
    store: SharedMetadata,
    notices: mpsc::UnboundedSender<Notice>,
}

impl MutationCoordinator {
    pub fn new(
        api: Arc<dyn CalouroApi>,
        store: SharedMetadata,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self { api, store, notices }
    }

    /// Marks or unmarks a row as favorite. Returns the task running the
    /// remote call, or `None` when the row is unknown or nothing has to be
    /// sent.
    pub fn toggle_favorite(
        &self,
        rows: &[StudentViewModel],
        id: &StudentId,
        favorited: bool,
    ) -> Option<JoinHandle<()>> {
        let row = find_row(rows, id)?;
        let message = if favorited {
            format!("{} adicionado aos favoritos", row.name)
        } else {
            format!("{} removido dos favoritos", row.name)
        };
        self.commit(row, Change::Favorite(favorited), message)
    }

    /// Moves a row to a new workflow status. Same contract as
    /// [`Self::toggle_favorite`].
    pub fn change_status(
        &self,
        rows: &[StudentViewModel],
        id: &StudentId,
        status: CalouroStatus,
    ) -> Option<JoinHandle<()>> {
        let row = find_row(rows, id)?;
        let message = format!("Status de {} alterado para {}", row.name, status.label());
        self.commit(row, Change::Status(status), message)
    }

    fn commit(
        &self,
        row: &StudentViewModel,
        change: Change,
        message: String,
    ) -> Option<JoinHandle<()>> {
        let undo = change.apply(&self.store, &row.key);
        // Nobody listening is fine; notices are best effort.
        let _ = self.notices.send(Notice::success(message));

        let write = match &row.id {
            StudentId::Persisted(id) => RemoteWrite::Update(*id, change),
            StudentId::Ephemeral(_) if change.is_default() => return None,
            StudentId::Ephemeral(_) => {
                let meta = self.store.get(&row.key);
                RemoteWrite::Create(NewCalouro {
                    entry: row.original.clone(),
                    favourite: meta.is_favorited,
                    status: meta.status,
                })
            }
        };

        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        let notices = self.notices.clone();
        let key = row.key.clone();
        let name = row.name.clone();

        Some(tokio::spawn(async move {
            let result = match write {
                RemoteWrite::Update(id, change) => change.send(api.as_ref(), id).await,
                RemoteWrite::Create(calouro) => api.create_calouro(&calouro).await.map(|new_id| {
                    info!(key = %key, id = new_id, "calouro persisted");
                    store.lock().set_db_id(&key, new_id);
                }),
            };

            if let Err(err) = result {
                warn!(key = %key, error = %err, "remote write failed, rolling back");
                undo.apply(&store, &key);
                let _ = notices.send(Notice::error(format!(
                    "Não foi possível salvar a alteração de {name}. Tente novamente."
                )));
            }
        }))
    }
}

fn find_row<'a>(rows: &'a [StudentViewModel], id: &StudentId) -> Option<&'a StudentViewModel> {
    let row = rows.iter().find(|row| &row.id == id);
    if row.is_none() {
        warn!(%id, "change requested for a row that is no longer listed");
    }
    row
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::{FixtureApi, Operation};
    use crate::metadata::{MetadataStore, StudentMeta};
    use crate::models::{CalouroRecord, Gender, HouseType, RosterEntry};
    use crate::view::build_view_models;
    use crate::view::tests::entry;

    struct Harness {
        api: Arc<FixtureApi>,
        store: SharedMetadata,
        coordinator: MutationCoordinator,
        notices: mpsc::UnboundedReceiver<Notice>,
        roster: Vec<RosterEntry>,
    }

    impl Harness {
        fn new(api: FixtureApi) -> Self {
            let api = Arc::new(api);
            let store = SharedMetadata::new(MetadataStore::new());
            let (tx, notices) = mpsc::unbounded_channel();
            let coordinator = MutationCoordinator::new(api.clone(), store.clone(), tx);
            Self {
                api,
                store,
                coordinator,
                notices,
                roster: vec![entry("Ana Silva", "Medicina", 1, Gender::Female)],
            }
        }

        fn rows(&self) -> Vec<StudentViewModel> {
            build_view_models(&self.roster, &self.store.snapshot(), HouseType::Feminina)
        }

        fn drain(&mut self) -> Vec<Notice> {
            let mut out = Vec::new();
            while let Ok(notice) = self.notices.try_recv() {
                out.push(notice);
            }
            out
        }
    }

    #[tokio::test]
    async fn favoriting_an_ephemeral_row_creates_it_and_retires_the_temp_id() {
        let mut h = Harness::new(FixtureApi::new(vec![]).with_next_id(42));
        let rows = h.rows();
        assert!(!rows[0].id.is_persisted());

        let task = h.coordinator.toggle_favorite(&rows, &rows[0].id.clone(), true);
        task.expect("create call expected").await.unwrap();

        let key = h.roster[0].key();
        assert_eq!(
            h.store.get(&key),
            StudentMeta {
                is_favorited: true,
                status: CalouroStatus::Pending,
                db_id: Some(42),
            }
        );
        assert_eq!(h.rows()[0].id, StudentId::Persisted(42));
        assert_eq!(
            h.api.calls(),
            vec![Operation::Create {
                favourite: true,
                status: CalouroStatus::Pending
            }]
        );
        assert_eq!(h.drain().len(), 1);
    }

    #[tokio::test]
    async fn failed_update_restores_previous_value_and_reports() {
        let mut h = Harness::new(FixtureApi::new(vec![]).failing_writes());
        let key = h.roster[0].key();
        h.store.lock().set_db_id(&key, 7);
        let before = h.store.get(&key);

        let rows = h.rows();
        let task = h.coordinator.toggle_favorite(&rows, &StudentId::Persisted(7), true);
        assert!(h.store.get(&key).is_favorited, "optimistic write is immediate");
        task.expect("update call expected").await.unwrap();

        assert_eq!(h.store.get(&key), before);
        let notices = h.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert_eq!(notices[1].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn failed_status_create_keeps_temp_id() {
        let mut h = Harness::new(FixtureApi::new(vec![]).failing_writes());
        let rows = h.rows();
        let id = rows[0].id.clone();

        let task = h.coordinator.change_status(&rows, &id, CalouroStatus::Contacted);
        task.expect("create call expected").await.unwrap();

        let meta = h.store.get(&h.roster[0].key());
        assert_eq!(meta.status, CalouroStatus::Pending);
        assert_eq!(meta.db_id, None);
        assert_eq!(h.rows()[0].id, id);
        assert_eq!(h.drain().last().map(|n| n.level), Some(NoticeLevel::Error));
    }

    #[tokio::test]
    async fn default_values_on_ephemeral_rows_skip_the_backend() {
        let mut h = Harness::new(FixtureApi::new(vec![]));
        let rows = h.rows();
        let id = rows[0].id.clone();

        assert!(h.coordinator.toggle_favorite(&rows, &id, false).is_none());
        assert!(h.coordinator.change_status(&rows, &id, CalouroStatus::Pending).is_none());
        assert!(h.api.calls().is_empty());
        assert_eq!(h.drain().len(), 2);
    }

    #[tokio::test]
    async fn persisted_rows_are_updated_in_place() {
        let roster = vec![entry("Ana Silva", "Medicina", 1, Gender::Female)];
        let record = CalouroRecord {
            id: 5,
            entry: roster[0].clone(),
            favourite: false,
            status: CalouroStatus::Pending,
        };
        let h = Harness::new(FixtureApi::new(vec![]).with_records(vec![record]));
        let key = h.roster[0].key();
        h.store.lock().set_db_id(&key, 5);
        let rows = h.rows();

        let task = h
            .coordinator
            .change_status(&rows, &StudentId::Persisted(5), CalouroStatus::Approved);
        task.expect("update call expected").await.unwrap();

        assert_eq!(h.store.get(&key).status, CalouroStatus::Approved);
        assert_eq!(
            h.api.calls(),
            vec![Operation::UpdateStatus {
                id: 5,
                status: CalouroStatus::Approved
            }]
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let mut h = Harness::new(FixtureApi::new(vec![]));
        let rows = h.rows();

        assert!(h.coordinator.toggle_favorite(&rows, &StudentId::Persisted(99), true).is_none());
        assert!(h.drain().is_empty());
        assert!(h.store.lock().is_empty());
    }
}
