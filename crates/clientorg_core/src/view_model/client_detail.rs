//! Client detail: client fields, owned phone numbers and company lookup.
//!
//! # Responsibility
//! - Wrap the loaded client and each of its phone numbers.
//! - Keep the shared [`DetailStatus`] current from wrapper notifications.
//! - Block deletion of clients that take part in a meeting.
//! - Refresh the company lookup as soon as a company collection is saved.
//!
//! # Invariants
//! - The phone wrapper list mirrors `Client::phone_numbers` in order.
//! - Every wrapper in the list has exactly one listener attached; a wrapper
//!   leaving the list is unsubscribed first.
//! - The company lookup always starts with the null item.
//! - The lookup refresh task lives exactly as long as the behavior.

use super::detail::{DetailBehavior, DetailStatus, DetailViewModel};
use crate::dialog::MessageDialogService;
use crate::events::{AfterCollectionSaved, EventAggregator};
use crate::model::client::{Client, ClientPhoneNumber};
use crate::model::lookup::LookupItem;
use crate::model::{lock, shared, EntityId, Shared};
use crate::observable::{ListenerId, PropertyChanged};
use crate::repo::client_repo::ClientRepository;
use crate::repo::lookup_repo::LookupDataService;
use crate::repo::{ConcurrencyConflict, RepoResult};
use crate::wrapper::client_wrapper::{FIRST_NAME, LAST_NAME};
use crate::wrapper::{ClientPhoneNumberWrapper, ClientWrapper, HAS_ERRORS};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

pub const CLIENT_DETAIL_VIEW_MODEL: &str = "ClientDetailViewModel";
/// Source name whose collection saves invalidate the company lookup.
pub const COMPANY_DETAIL_VIEW_MODEL: &str = "CompanyDetailViewModel";
/// Raised on the detail status whenever the company lookup is replaced.
pub const COMPANIES: &str = "companies";

pub type ClientDetailViewModel = DetailViewModel<ClientDetail>;

struct PhoneNumberEntry {
    wrapper: ClientPhoneNumberWrapper,
    listener: ListenerId,
}

pub struct ClientDetail {
    repo: Arc<dyn ClientRepository>,
    lookups: Arc<dyn LookupDataService>,
    status: DetailStatus,
    client: Option<(ClientWrapper, ListenerId)>,
    phone_numbers: Vec<PhoneNumberEntry>,
    selected_phone_number: Option<usize>,
    companies: Shared<Vec<LookupItem>>,
    lookup_refresh: Option<JoinHandle<()>>,
}

impl DetailViewModel<ClientDetail> {
    /// Builds a client detail view model for one session.
    pub fn for_client(
        repo: Arc<dyn ClientRepository>,
        lookups: Arc<dyn LookupDataService>,
        events: EventAggregator,
        dialogs: Arc<dyn MessageDialogService>,
    ) -> Self {
        let status = DetailStatus::new();
        let behavior = ClientDetail::new(repo, lookups, &events, status.clone());
        Self::new(behavior, status, events, dialogs)
    }
}

impl ClientDetail {
    /// Builds the behavior and starts listening for company collection saves.
    ///
    /// The listener runs on the current tokio runtime; outside a runtime the
    /// lookup is only filled by `load`.
    pub fn new(
        repo: Arc<dyn ClientRepository>,
        lookups: Arc<dyn LookupDataService>,
        events: &EventAggregator,
        status: DetailStatus,
    ) -> Self {
        let companies = shared(Vec::new());
        let lookup_refresh = spawn_company_refresh(
            events.subscribe::<AfterCollectionSaved>(),
            Arc::clone(&lookups),
            Arc::clone(&companies),
            status.clone(),
        );
        Self {
            repo,
            lookups,
            status,
            client: None,
            phone_numbers: Vec::new(),
            selected_phone_number: None,
            companies,
            lookup_refresh,
        }
    }

    pub fn client(&self) -> Option<&ClientWrapper> {
        self.client.as_ref().map(|(wrapper, _)| wrapper)
    }

    pub fn client_mut(&mut self) -> Option<&mut ClientWrapper> {
        self.client.as_mut().map(|(wrapper, _)| wrapper)
    }

    pub fn phone_numbers(&self) -> impl Iterator<Item = &ClientPhoneNumberWrapper> {
        self.phone_numbers.iter().map(|entry| &entry.wrapper)
    }

    pub fn phone_number_count(&self) -> usize {
        self.phone_numbers.len()
    }

    pub fn phone_number_mut(&mut self, index: usize) -> Option<&mut ClientPhoneNumberWrapper> {
        self.phone_numbers
            .get_mut(index)
            .map(|entry| &mut entry.wrapper)
    }

    /// Current company lookup, null item first.
    pub fn companies(&self) -> Vec<LookupItem> {
        lock(&self.companies).clone()
    }

    pub fn selected_phone_number(&self) -> Option<usize> {
        self.selected_phone_number
    }

    /// Selects a phone number by list index; out-of-range clears the selection.
    pub fn select_phone_number(&mut self, index: Option<usize>) {
        self.selected_phone_number = index.filter(|index| *index < self.phone_numbers.len());
    }

    pub fn can_remove_phone_number(&self) -> bool {
        self.selected_phone_number.is_some()
    }

    /// Appends an empty phone number to the client and returns its index.
    ///
    /// The new number is validated at once, so it reports "required" until
    /// filled in.
    pub fn add_phone_number(&mut self) -> Option<usize> {
        let (client, _) = self.client.as_ref()?;
        let handle = lock(client.model()).push_phone_number(ClientPhoneNumber::default());
        let entry = self.attach_phone_number(handle);
        self.phone_numbers.push(entry);
        let index = self.phone_numbers.len() - 1;

        self.phone_numbers[index].wrapper.validate();
        if !self.status.has_changes() {
            self.status.set_has_changes(self.repo.has_changes());
        }
        debug!("event=phone_number_add module=view_model index={index}");
        Some(index)
    }

    /// Removes the selected phone number from the list and the client, and
    /// stages its row for deletion.
    ///
    /// Returns `false` when nothing is selected.
    pub fn remove_phone_number(&mut self) -> bool {
        let (Some(index), Some((client, _))) = (self.selected_phone_number, self.client.as_ref())
        else {
            return false;
        };
        if index >= self.phone_numbers.len() {
            return false;
        }
        let entry = self.phone_numbers.remove(index);
        entry.wrapper.unsubscribe(entry.listener);
        self.repo.remove_phone_number(entry.wrapper.model());
        lock(client.model()).detach_phone_number(entry.wrapper.model());

        self.selected_phone_number = None;
        self.status.set_has_changes(self.repo.has_changes());
        self.status.raise_save_can_execute();
        debug!("event=phone_number_remove module=view_model index={index}");
        true
    }

    fn initialize_client(&mut self, client: Shared<Client>) {
        if let Some((previous, listener)) = self.client.take() {
            previous.unsubscribe(listener);
        }

        let mut wrapper = ClientWrapper::new(Arc::clone(&client));
        let listener = wrapper.subscribe(self.client_listener(client));
        if wrapper.id() == 0 {
            wrapper.validate();
        }
        self.status.set_title(wrapper.display_name());
        self.client = Some((wrapper, listener));
        self.status.raise_save_can_execute();
    }

    fn initialize_phone_numbers(&mut self) {
        for entry in self.phone_numbers.drain(..) {
            entry.wrapper.unsubscribe(entry.listener);
        }
        self.selected_phone_number = None;

        let Some((client, _)) = self.client.as_ref() else {
            return;
        };
        let handles = lock(client.model()).phone_numbers.clone();
        self.phone_numbers = handles
            .into_iter()
            .map(|handle| self.attach_phone_number(handle))
            .collect();
    }

    fn attach_phone_number(&self, handle: Shared<ClientPhoneNumber>) -> PhoneNumberEntry {
        let wrapper = ClientPhoneNumberWrapper::new(handle);
        let listener = wrapper.subscribe(self.child_listener());
        PhoneNumberEntry { wrapper, listener }
    }

    fn client_listener(
        &self,
        client: Shared<Client>,
    ) -> impl Fn(&PropertyChanged) + Send + Sync + 'static {
        let repo = Arc::clone(&self.repo);
        let status = self.status.clone();
        move |change| {
            if !status.has_changes() {
                status.set_has_changes(repo.has_changes());
            }
            match change.property {
                HAS_ERRORS => status.raise_save_can_execute(),
                FIRST_NAME | LAST_NAME => status.set_title(lock(&client).display_name()),
                _ => {}
            }
        }
    }

    fn child_listener(&self) -> impl Fn(&PropertyChanged) + Send + Sync + 'static {
        let repo = Arc::clone(&self.repo);
        let status = self.status.clone();
        move |change| {
            if !status.has_changes() {
                status.set_has_changes(repo.has_changes());
            }
            if change.property == HAS_ERRORS {
                status.raise_save_can_execute();
            }
        }
    }
}

impl Drop for ClientDetail {
    fn drop(&mut self) {
        if let Some(task) = self.lookup_refresh.take() {
            task.abort();
        }
    }
}

/// Replaces the company lookup with the stored companies behind the null item.
async fn refresh_companies(
    lookups: &dyn LookupDataService,
    companies: &Shared<Vec<LookupItem>>,
) -> RepoResult<()> {
    let lookup = lookups.company_lookup().await?;
    let mut items = Vec::with_capacity(lookup.len() + 1);
    items.push(LookupItem::null());
    items.extend(lookup);
    let count = items.len();
    *lock(companies) = items;
    debug!("event=lookup_load module=view_model lookup=companies count={count}");
    Ok(())
}

fn spawn_company_refresh(
    mut collection_saved: broadcast::Receiver<AfterCollectionSaved>,
    lookups: Arc<dyn LookupDataService>,
    companies: Shared<Vec<LookupItem>>,
    status: DetailStatus,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        warn!("event=lookup_refresh module=view_model status=disabled reason=no_runtime");
        return None;
    };

    Some(runtime.spawn(async move {
        loop {
            match collection_saved.recv().await {
                Ok(event) if event.view_model_name != COMPANY_DETAIL_VIEW_MODEL => continue,
                Ok(_) => {}
                // Missed events may have included a company save.
                Err(RecvError::Lagged(skipped)) => {
                    debug!("event=lookup_refresh module=view_model status=lagged skipped={skipped}");
                }
                Err(RecvError::Closed) => break,
            }

            match refresh_companies(lookups.as_ref(), &companies).await {
                Ok(()) => status.raise_property_changed(COMPANIES),
                Err(err) => warn!(
                    "event=lookup_refresh module=view_model status=error lookup=companies error={err}"
                ),
            }
        }
    }))
}

#[async_trait]
impl DetailBehavior for ClientDetail {
    fn view_model_name(&self) -> &'static str {
        CLIENT_DETAIL_VIEW_MODEL
    }

    fn entity_kind(&self) -> &'static str {
        "Client"
    }

    async fn load(&mut self, id: EntityId) -> RepoResult<()> {
        let client = if id > 0 {
            self.repo.get_by_id(id).await?
        } else {
            let client = shared(Client::new());
            self.repo.add(Arc::clone(&client));
            client
        };

        self.initialize_client(client);
        self.initialize_phone_numbers();
        refresh_companies(self.lookups.as_ref(), &self.companies).await?;
        self.status.raise_property_changed(COMPANIES);
        Ok(())
    }

    fn can_save(&self) -> bool {
        self.client().is_some_and(|client| !client.has_errors())
            && self
                .phone_numbers
                .iter()
                .all(|entry| !entry.wrapper.has_errors())
    }

    async fn try_save(&self) -> RepoResult<()> {
        self.repo.save().await
    }

    fn has_changes(&self) -> bool {
        self.repo.has_changes()
    }

    fn entity_id(&self) -> EntityId {
        self.client().map_or(0, ClientWrapper::id)
    }

    fn display_label(&self) -> String {
        self.client()
            .map(ClientWrapper::display_name)
            .unwrap_or_default()
    }

    async fn accept_database_values(&self, conflict: &ConcurrencyConflict) -> RepoResult<()> {
        for entry in &conflict.entries {
            self.repo.refresh_original_values(entry.id).await?;
        }
        Ok(())
    }

    async fn discard_changes(&self, conflict: &ConcurrencyConflict) -> RepoResult<()> {
        for entry in &conflict.entries {
            self.repo.reload(entry.id).await?;
        }
        Ok(())
    }

    async fn deletion_veto(&self) -> RepoResult<Option<String>> {
        let Some(client) = self.client() else {
            return Ok(None);
        };
        if !self.repo.has_meetings(client.id()).await? {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} can't be deleted as this client is part of at least one meeting",
            client.display_name()
        )))
    }

    async fn try_delete(&self) -> RepoResult<()> {
        let Some(client) = self.client() else {
            return Ok(());
        };
        self.repo.remove(client.model());
        if let Err(err) = self.repo.save().await {
            self.repo.cancel_remove(client.model());
            return Err(err);
        }
        info!(
            "event=client_delete module=view_model status=ok id={}",
            client.id()
        );
        Ok(())
    }
}
