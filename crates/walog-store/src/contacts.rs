//! Contact directory: display names keyed by participant or group id.

use rusqlite::params;
use walog_core::store::ContactDirectory;
use walog_shared::Contact;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert or replace the entry for `contact.uid`.
    pub fn upsert_contact(&self, contact: &Contact) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO contacts (uid, name, is_group) VALUES (?1, ?2, ?3)",
            params![contact.uid, contact.name, contact.is_group as i32],
        )?;
        Ok(())
    }

    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT uid, name, is_group FROM contacts ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Contact {
                uid: row.get(0)?,
                name: row.get(1)?,
                is_group: row.get::<_, i32>(2)? != 0,
            })
        })?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }
}

impl ContactDirectory for Database {
    type Error = StoreError;

    fn find_all_contacts(&self) -> Result<Vec<Contact>> {
        self.list_contacts()
    }

    fn upsert_contact(&self, contact: &Contact) -> Result<()> {
        Database::upsert_contact(self, contact)
    }
}
