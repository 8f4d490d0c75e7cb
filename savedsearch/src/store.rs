//! Redis persistence for saved searches.
//!
//! Each record is stored as JSON under its own key; set indexes track the ids
//! per owning scope and overall. Writes go through one `MULTI` pipeline so a
//! record and its indexes never disagree. Only generated ids are accepted.

use redis::{aio::ConnectionManager, cmd};

use crate::{
    cleanup_pattern,
    errors::{Result, SearchError},
    id::is_saved_search_id,
    keys::KeyContext,
    saved_search::SavedSearch,
};

#[derive(Debug, Clone)]
pub struct SavedSearchRepo {
    prefix: String,
}

impl SavedSearchRepo {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    /// Validate, derive and persist `search`.
    ///
    /// An existing record keeps its slug and creation date.
    pub async fn save(&self, conn: &mut ConnectionManager, search: &mut SavedSearch) -> Result<()> {
        ensure_saved_search_id(&search.id)?;
        let previous = self.get(conn, &search.id).await?;
        if let Some(previous) = &previous {
            search.inherit_slug(previous.name_slug().map(str::to_string));
            if search.date_created.is_none() {
                search.date_created = previous.date_created;
            }
        }

        search.prepare_for_save()?;
        let payload = serde_json::to_string(search).map_err(|err| SearchError::Other {
            message: format!("failed to serialize saved search: {err}").into(),
        })?;

        let keys = self.keys();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("SET").arg(keys.saved_search(&search.id)).arg(payload).ignore();
        if let Some(old_group) = previous.as_ref().and_then(|prev| prev.group.as_deref())
            && search.group.as_deref() != Some(old_group)
        {
            pipe.cmd("SREM").arg(keys.scope_index(old_group)).arg(&search.id).ignore();
        }
        if let Some(group) = search.group.as_deref() {
            pipe.cmd("SADD").arg(keys.scope_index(group)).arg(&search.id).ignore();
        }
        pipe.cmd("SADD").arg(keys.all_index()).arg(&search.id).ignore();
        pipe.query_async::<()>(conn).await?;

        log::debug!("saved search {} stored with query '{}'", search.id, search.querystring());
        Ok(())
    }

    pub async fn get(&self, conn: &mut ConnectionManager, id: &str) -> Result<Option<SavedSearch>> {
        ensure_saved_search_id(id)?;
        let raw: Option<String> = cmd("GET").arg(self.keys().saved_search(id)).query_async(conn).await?;
        raw.as_deref().map(decode).transpose()
    }

    /// Remove a record and its index entries. Returns whether it existed.
    pub async fn delete(&self, conn: &mut ConnectionManager, id: &str) -> Result<bool> {
        ensure_saved_search_id(id)?;
        let Some(existing) = self.get(conn, id).await? else {
            return Ok(false);
        };

        let keys = self.keys();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("DEL").arg(keys.saved_search(id)).ignore();
        if let Some(group) = existing.group.as_deref() {
            pipe.cmd("SREM").arg(keys.scope_index(group)).arg(id).ignore();
        }
        pipe.cmd("SREM").arg(keys.all_index()).arg(id).ignore();
        pipe.query_async::<()>(conn).await?;
        Ok(true)
    }

    /// Saved searches owned by any of `scopes`, sorted by name.
    pub async fn list_for_scopes<S: AsRef<str>>(
        &self,
        conn: &mut ConnectionManager,
        scopes: &[S],
    ) -> Result<Vec<SavedSearch>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.keys();
        let index_keys: Vec<String> = scopes.iter().map(|scope| keys.scope_index(scope.as_ref())).collect();
        let ids: Vec<String> = cmd("SUNION").arg(&index_keys).query_async(conn).await?;
        let searches = self.load_many(conn, &ids).await?;
        Ok(searches.into_iter().filter(|search| search.is_visible_to(scopes)).collect())
    }

    /// Every stored saved search, sorted by name.
    pub async fn list_all(&self, conn: &mut ConnectionManager) -> Result<Vec<SavedSearch>> {
        let ids: Vec<String> = cmd("SMEMBERS").arg(self.keys().all_index()).query_async(conn).await?;
        self.load_many(conn, &ids).await
    }

    /// Delete every key under this repo's prefix.
    pub async fn cleanup_prefix(&self, conn: &mut ConnectionManager) -> Result<u64> {
        cleanup_pattern(conn, &self.keys().pattern()).await
    }

    async fn load_many(&self, conn: &mut ConnectionManager, ids: &[String]) -> Result<Vec<SavedSearch>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.keys();
        let record_keys: Vec<String> = ids.iter().map(|id| keys.saved_search(id)).collect();
        let raw: Vec<Option<String>> = cmd("MGET").arg(&record_keys).query_async(conn).await?;

        let mut searches = raw
            .iter()
            .flatten()
            .map(|payload| decode(payload))
            .collect::<Result<Vec<_>>>()?;
        searches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(searches)
    }
}

fn ensure_saved_search_id(id: &str) -> Result<()> {
    if is_saved_search_id(id) {
        Ok(())
    } else {
        Err(SearchError::InvalidRequest {
            message: format!("invalid saved search id '{id}'"),
        })
    }
}

fn decode(payload: &str) -> Result<SavedSearch> {
    serde_json::from_str(payload).map_err(|err| SearchError::Other {
        message: format!("failed to deserialize saved search: {err}").into(),
    })
}
