// Client repository: typed CRUD and lookups over the clients store

use crate::engine::{now_ms, Engine};
use crate::error::{Result, StoreError};
use crate::filter::{Filter, IndexValue};
use crate::models::{Client, ClientPatch, NewClient};
use crate::schema::CLIENTS;
use tracing::debug;

/// Short-lived handle over the clients store
pub struct Clients<'a> {
    engine: &'a mut Engine,
}

impl Engine {
    pub fn clients(&mut self) -> Clients<'_> {
        Clients { engine: self }
    }
}

impl Clients<'_> {
    /// Create a client, assigning its identifier and creation timestamp.
    pub fn create(&mut self, new: NewClient) -> Result<Client> {
        if new.name.trim().is_empty() {
            return Err(StoreError::validation("client name is required"));
        }

        let client = Client {
            id: Engine::generate_id(),
            name: new.name,
            phone: new.phone,
            email: new.email,
            address: new.address,
            created_at: now_ms(),
        };

        let value = serde_json::to_value(&client)?;
        self.engine.put(CLIENTS, &client.id, &value)?;
        debug!(id = %client.id, "Created client");
        Ok(client)
    }

    pub fn get(&self, id: &str) -> Result<Option<Client>> {
        match self.engine.get(CLIENTS, id)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Full scan of all clients. No ordering contract.
    pub fn list(&self) -> Result<Vec<Client>> {
        self.engine
            .scan(CLIENTS)?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Shallow-merge a patch onto the stored client.
    ///
    /// The identifier and creation timestamp always come from the stored
    /// record; a patch cannot move either.
    pub fn update(&mut self, id: &str, patch: ClientPatch) -> Result<Client> {
        let mut client = self
            .get(id)?
            .ok_or_else(|| StoreError::not_found("client", id))?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(StoreError::validation("client name cannot be blank"));
            }
            client.name = name;
        }
        if let Some(phone) = patch.phone {
            client.phone = phone;
        }
        if let Some(email) = patch.email {
            client.email = email;
        }
        if let Some(address) = patch.address {
            client.address = address;
        }

        let value = serde_json::to_value(&client)?;
        self.engine.put(CLIENTS, id, &value)?;
        Ok(client)
    }

    /// Hard delete; referencing estimates and invoices are left in place.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.engine.delete(CLIENTS, id)
    }

    /// Case-insensitive name substring search.
    pub fn search(&self, query: &str) -> Result<Vec<Client>> {
        let needle = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Exact email lookup via the secondary index.
    pub fn find_by_email(&self, email: &str) -> Result<Vec<Client>> {
        self.engine
            .query(
                CLIENTS,
                &[Filter::eq("email", IndexValue::String(email.to_string()))],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Exact phone lookup via the secondary index.
    pub fn find_by_phone(&self, phone: &str) -> Result<Vec<Client>> {
        self.engine
            .query(
                CLIENTS,
                &[Filter::eq("phone", IndexValue::String(phone.to_string()))],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            phone: "555-0100".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            address: "1 Main St".to_string(),
        }
    }

    #[test]
    fn test_create_assigns_id_and_timestamp() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let client = engine.clients().create(new_client("Ada")).unwrap();
        assert!(uuid::Uuid::parse_str(&client.id).is_ok());
        assert!(client.created_at > 0);

        let fetched = engine.clients().get(&client.id).unwrap().unwrap();
        assert_eq!(fetched, client);
    }

    #[test]
    fn test_create_requires_name() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let err = engine
            .clients()
            .create(NewClient::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_update_merges_and_pins_identity() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let client = engine.clients().create(new_client("Ada")).unwrap();

        let updated = engine
            .clients()
            .update(
                &client.id,
                ClientPatch {
                    phone: Some("555-0199".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, client.id);
        assert_eq!(updated.created_at, client.created_at);
        assert_eq!(updated.phone, "555-0199");
        assert_eq!(updated.name, "Ada"); // untouched
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let err = engine
            .clients()
            .update("missing", ClientPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_delete_then_get_is_none() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let client = engine.clients().create(new_client("Ada")).unwrap();
        engine.clients().delete(&client.id).unwrap();
        assert!(engine.clients().get(&client.id).unwrap().is_none());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        engine.clients().create(new_client("Ada Lovelace")).unwrap();
        engine.clients().create(new_client("Grace Hopper")).unwrap();

        let hits = engine.clients().search("LOVE").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Ada Lovelace");

        assert!(engine.clients().search("turing").unwrap().is_empty());
    }

    #[test]
    fn test_find_by_email_and_phone() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let ada = engine.clients().create(new_client("Ada")).unwrap();
        engine.clients().create(new_client("Grace")).unwrap();

        let by_email = engine.clients().find_by_email("ada@example.com").unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].id, ada.id);

        // Both share the same phone in the fixture
        let by_phone = engine.clients().find_by_phone("555-0100").unwrap();
        assert_eq!(by_phone.len(), 2);
    }
}
