//! Typed operations of the list service.
//!
//! Each method of [`BackendApi`] builds one [`Endpoint`] and runs it through
//! the [`NetworkManager`], so token refresh and logout handling apply to all
//! of them.

use crate::codec::AuthenticationToken;
use crate::endpoint::{Endpoint, HttpMethod};
use crate::error::Result;
use crate::network::NetworkManager;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RETRIEVE_LIST_NAMES_PATH: &str = "retrieve_list_names";
const RETRIEVE_LIST_PATH: &str = "retrieve_list";
const CREATE_NEW_LIST_PATH: &str = "create_new_list";
const ADD_NEW_ITEM_TO_LIST_PATH: &str = "add_new_item_to_list";
const UPDATE_LIST_ENTRY_VALUES_PATH: &str = "update_list_entry_values";
const DELETE_ENTRY_PATH: &str = "delete_entry";
const REMOVE_LIST_NAME_PATH: &str = "return_remaining_lists_after_removal_of_list_name";
const FIND_ITEMS_FOR_USER_PATH: &str = "find_items_for_user";

/// Timeout for reads that may return a whole list.
const BULK_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A list owned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListNameWithId {
    /// Server-side identifier. The service sends it as a string.
    pub list_id: String,
    /// Display name, unique per user.
    pub list_name: String,
}

/// Which part of a list an entry is shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    /// Placeholder while more of the list is loading.
    LoadingMoreToList,
    /// Search results.
    ItemsFound,
    /// Entries not yet checked off.
    Uncompleted,
    /// Checked-off entries.
    Completed,
    /// Marker after the last entry.
    ListEnd,
    /// Anything the client does not know about.
    #[default]
    #[serde(other)]
    Unspecified,
}

/// One entry together with the list and section it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListSectionWithEntry {
    /// Identifier of the owning list.
    pub list_id: u64,
    /// Name of the owning list.
    pub list_name: String,
    /// Identifier of the section.
    #[serde(default)]
    pub section_id: u64,
    /// Name of the section.
    #[serde(default)]
    pub section_name: String,
    /// Kind of section.
    #[serde(default)]
    pub section_type: SectionType,
    /// Identifier of the entry.
    pub entry_id: u64,
    /// Entry text.
    pub entry_name: String,
    /// Whether the entry is checked off.
    pub entry_is_check_marked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct ViewList<'a> {
    list_name: &'a str,
    direction_to_read_list: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct CreateList<'a> {
    list_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct AddItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    list_name: &'a str,
    entry_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct UpdateItem<'a> {
    list_id: u64,
    list_name: &'a str,
    entry_id: u64,
    entry_name: &'a str,
    entry_is_check_marked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct DeleteEntry {
    entry_id: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct RemoveListName<'a> {
    list_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct SearchRequest<'a> {
    search_request: &'a str,
    list_name: &'a str,
}

#[derive(Deserialize)]
struct ListNames {
    list_names: Vec<ListNameWithId>,
}

fn list_names_endpoint() -> Endpoint {
    Endpoint::without_payload(HttpMethod::Get, RETRIEVE_LIST_NAMES_PATH)
        .with_timeout(BULK_READ_TIMEOUT)
}

fn list_endpoint(list_name: &str) -> Result<Endpoint> {
    let payload = ViewList {
        list_name,
        direction_to_read_list: "initial",
    };
    Ok(Endpoint::new(HttpMethod::Get, RETRIEVE_LIST_PATH, &payload)?
        .with_query_params()
        .with_timeout(BULK_READ_TIMEOUT))
}

fn create_list_endpoint(list_name: &str) -> Result<Endpoint> {
    Ok(Endpoint::new(HttpMethod::Post, CREATE_NEW_LIST_PATH, &CreateList { list_name })?)
}

fn add_to_list_endpoint(id: Option<u64>, list_name: &str, entry_name: &str) -> Result<Endpoint> {
    let payload = AddItem {
        id,
        list_name,
        entry_name,
    };
    Ok(Endpoint::new(HttpMethod::Post, ADD_NEW_ITEM_TO_LIST_PATH, &payload)?)
}

fn update_entry_endpoint(entry: &ListSectionWithEntry) -> Result<Endpoint> {
    let payload = UpdateItem {
        list_id: entry.list_id,
        list_name: &entry.list_name,
        entry_id: entry.entry_id,
        entry_name: &entry.entry_name,
        entry_is_check_marked: entry.entry_is_check_marked,
    };
    Ok(Endpoint::new(HttpMethod::Patch, UPDATE_LIST_ENTRY_VALUES_PATH, &payload)?
        .with_query_params())
}

fn delete_entry_endpoint(entry_id: u64) -> Result<Endpoint> {
    let payload = DeleteEntry { entry_id };
    Ok(Endpoint::new(HttpMethod::Delete, DELETE_ENTRY_PATH, &payload)?.with_query_params())
}

fn remove_list_endpoint(list_name: &str) -> Result<Endpoint> {
    Ok(Endpoint::new(HttpMethod::Post, REMOVE_LIST_NAME_PATH, &RemoveListName { list_name })?
        .with_timeout(BULK_READ_TIMEOUT))
}

fn search_endpoint(text: &str, list_name: &str) -> Result<Endpoint> {
    let payload = SearchRequest {
        search_request: text,
        list_name,
    };
    Ok(Endpoint::new(HttpMethod::Get, FIND_ITEMS_FOR_USER_PATH, &payload)?
        .with_query_params()
        .with_timeout(BULK_READ_TIMEOUT))
}

/// The list service's business operations.
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::{BackendApi, MemoryStore, NetworkManager, ReqwestTransport};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), newbcook_sdk::Error> {
/// let manager = NetworkManager::builder()
///     .transport(Arc::new(ReqwestTransport::new()?))
///     .store(Arc::new(MemoryStore::new()))
///     .build()?;
/// let api = BackendApi::new(manager);
///
/// api.login("api.example.com", "alice", "secret").await?;
/// api.create_list("groceries").await?;
/// let entry = api.add_to_list(None, "groceries", "milk").await?;
///
/// for section in api.list("groceries").await? {
///     println!("{} [{}]", section.entry_name, section.entry_is_check_marked);
/// }
/// api.delete_entry(entry.entry_id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BackendApi {
    manager: NetworkManager,
}

impl BackendApi {
    /// Wraps a configured network manager.
    pub fn new(manager: NetworkManager) -> Self {
        Self { manager }
    }

    /// The underlying network manager.
    pub fn manager(&self) -> &NetworkManager {
        &self.manager
    }

    /// Logs in and stores the session.
    pub async fn login(
        &self,
        hostname: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationToken> {
        self.manager.login(hostname, username, password).await
    }

    /// Forgets the session.
    pub fn logout(&self) {
        self.manager.logout()
    }

    /// Returns `true` if an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    /// Fetches the names of all lists the user owns.
    pub async fn list_names(&self) -> Result<Vec<ListNameWithId>> {
        let response = self.manager.execute::<ListNames>(&list_names_endpoint()).await?;
        Ok(response.data.list_names)
    }

    /// Fetches every entry of a list.
    pub async fn list(&self, list_name: &str) -> Result<Vec<ListSectionWithEntry>> {
        let response = self.manager.execute(&list_endpoint(list_name)?).await?;
        Ok(response.data)
    }

    /// Creates an empty list.
    pub async fn create_list(&self, list_name: &str) -> Result<()> {
        self.manager
            .execute::<IgnoredAny>(&create_list_endpoint(list_name)?)
            .await?;
        Ok(())
    }

    /// Adds an entry to a list. Passing the section `id` of an existing entry
    /// replaces that entry instead.
    pub async fn add_to_list(
        &self,
        id: Option<u64>,
        list_name: &str,
        entry_name: &str,
    ) -> Result<ListSectionWithEntry> {
        let endpoint = add_to_list_endpoint(id, list_name, entry_name)?;
        let response = self.manager.execute(&endpoint).await?;
        Ok(response.data)
    }

    /// Writes the name and check mark of an entry back to the server.
    pub async fn update_entry(&self, entry: &ListSectionWithEntry) -> Result<ListSectionWithEntry> {
        let response = self.manager.execute(&update_entry_endpoint(entry)?).await?;
        Ok(response.data)
    }

    /// Deletes an entry.
    pub async fn delete_entry(&self, entry_id: u64) -> Result<()> {
        self.manager
            .execute::<IgnoredAny>(&delete_entry_endpoint(entry_id)?)
            .await?;
        Ok(())
    }

    /// Deletes a list and returns the lists that remain.
    pub async fn remove_list(&self, list_name: &str) -> Result<Vec<ListNameWithId>> {
        let response = self.manager.execute(&remove_list_endpoint(list_name)?).await?;
        Ok(response.data)
    }

    /// Searches the entries of a list.
    pub async fn search(&self, text: &str, list_name: &str) -> Result<Vec<ListSectionWithEntry>> {
        let response = self.manager.execute(&search_endpoint(text, list_name)?).await?;
        Ok(response.data)
    }
}
