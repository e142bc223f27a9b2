//! Contact directory: debounced search, create, update and delete.

use std::sync::Arc;
use std::time::Duration;

use helpline_client::{Gateway, SessionContext};
use helpline_core::{
    format_tags, non_blank, parse_tags, Action, Contact, ContactFilter, ContactId,
    ContactPatch, NewContact,
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::debounce::{Debouncer, Latest};
use crate::entry::{Redirect, RedirectEntry};
use crate::error::{require, FlowError, Result};
use crate::nav::Route;

/// Editable contact fields as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    /// Phone number; required.
    pub phone_number: String,
    /// Name.
    pub name: String,
    /// Email.
    pub email: String,
    /// Address.
    pub address: String,
    /// Company.
    pub company: String,
    /// Comma-separated tags.
    pub tags: String,
}

impl ContactForm {
    /// Pre-fill the form from an existing contact.
    #[must_use]
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            phone_number: contact.phone_number.clone(),
            name: contact.name.clone().unwrap_or_default(),
            email: contact.email.clone().unwrap_or_default(),
            address: contact.address.clone().unwrap_or_default(),
            company: contact.company.clone().unwrap_or_default(),
            tags: format_tags(&contact.tags),
        }
    }

    fn phone(&self) -> Result<String> {
        non_blank(Some(self.phone_number.as_str()))
            .ok_or_else(|| FlowError::validation("Phone number is required"))
    }

    /// Creation payload.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the phone number is blank.
    pub fn to_new_contact(&self) -> Result<NewContact> {
        Ok(NewContact {
            phone_number: self.phone()?,
            name: non_blank(Some(self.name.as_str())),
            email: non_blank(Some(self.email.as_str())),
            address: non_blank(Some(self.address.as_str())),
            company: non_blank(Some(self.company.as_str())),
            tags: parse_tags(&self.tags),
        })
    }

    /// Full-replacement update payload. Blank text fields are sent as `""`
    /// so the edit clears them.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the phone number is blank.
    pub fn to_patch(&self) -> Result<ContactPatch> {
        Ok(ContactPatch {
            phone_number: Some(self.phone()?),
            name: Some(self.name.trim().to_string()),
            email: Some(self.email.trim().to_string()),
            address: Some(self.address.trim().to_string()),
            company: Some(self.company.trim().to_string()),
            tags: Some(parse_tags(&self.tags)),
        })
    }
}

/// The contact directory screen.
pub struct ContactDirectory {
    gateway: Arc<dyn Gateway>,
    session: SessionContext,
    filter: Mutex<ContactFilter>,
    search: Debouncer<Vec<Contact>>,
}

impl std::fmt::Debug for ContactDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactDirectory")
            .field("filter", &*self.filter.lock())
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl ContactDirectory {
    /// Open the directory.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NotAuthenticated` or `FlowError::Forbidden` if the
    /// session may not view contacts.
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionContext, quiet: Duration) -> Result<Self> {
        require(&session, Action::ViewContacts)?;
        Ok(Self {
            gateway,
            session,
            filter: Mutex::new(ContactFilter::default()),
            search: Debouncer::new(quiet),
        })
    }

    /// The active filter.
    #[must_use]
    pub fn filter(&self) -> ContactFilter {
        self.filter.lock().clone()
    }

    /// Subscribe to list updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Latest<Vec<Contact>>> {
        self.search.subscribe()
    }

    /// Contacts from the newest completed fetch; empty if it failed.
    #[must_use]
    pub fn contacts(&self) -> Vec<Contact> {
        self.search
            .latest()
            .and_then(|o| o.result.as_ref().ok().cloned())
            .unwrap_or_default()
    }

    /// Error from the newest completed fetch, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.search
            .latest()
            .and_then(|o| o.result.as_ref().err().map(ToString::to_string))
    }

    /// Fetch now with the current filter.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the fetch failed, or `FlowError::Busy`
    /// if a newer search superseded this one before it finished.
    pub async fn refresh(&self) -> Result<Vec<Contact>> {
        let filter = self.filter();
        let gateway = Arc::clone(&self.gateway);
        let outcome = self
            .search
            .run_now(filter.search.clone().unwrap_or_default(), |_| async move {
                fetch(gateway.as_ref(), &filter).await
            })
            .await
            .ok_or(FlowError::Busy)?;
        match &outcome.result {
            Ok(contacts) => Ok(contacts.clone()),
            Err(e) => Err(e.to_remote()),
        }
    }

    /// Update the search text; the fetch runs after the quiet period.
    ///
    /// Returns the search generation.
    pub fn search(&self, text: &str) -> u64 {
        let filter = {
            let mut filter = self.filter.lock();
            filter.search = non_blank(Some(text));
            filter.clone()
        };
        let gateway = Arc::clone(&self.gateway);
        self.search.schedule(text, move |_| async move {
            fetch(gateway.as_ref(), &filter).await
        })
    }

    /// Change the tag filter and refetch immediately.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh`].
    pub async fn set_tag(&self, tag: Option<&str>) -> Result<Vec<Contact>> {
        self.filter.lock().tag = tag.and_then(|t| non_blank(Some(t)));
        self.refresh().await
    }

    /// Fetch one contact.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn get(&self, id: &ContactId) -> Result<Contact> {
        self.gateway
            .get_contact(id)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to load contact"))
    }

    /// Create a contact, then refetch the list.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the phone number is blank, or
    /// `FlowError::Remote` if the request failed.
    pub async fn create(&self, form: &ContactForm) -> Result<Contact> {
        require(&self.session, Action::ManageContacts)?;
        let body = form.to_new_contact()?;
        let contact = self
            .gateway
            .create_contact(&body)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to create contact"))?;
        tracing::info!(contact_id = %contact.id, "Contact created");
        self.refetch().await;
        Ok(contact)
    }

    /// Create the contact for a telephony redirect and hand off to call logging.
    ///
    /// The redirect's phone number wins over whatever the form holds.
    ///
    /// # Errors
    ///
    /// See [`Self::create`].
    pub async fn create_from_redirect(
        &self,
        entry: &RedirectEntry,
        form: &ContactForm,
    ) -> Result<(Contact, Redirect)> {
        let form = ContactForm {
            phone_number: entry.phone.clone(),
            ..form.clone()
        };
        let contact = self.create(&form).await?;
        let mut next = entry.clone().with_contact(contact.id.clone());
        next.phone.clone_from(&contact.phone_number);
        Ok((
            contact,
            Redirect {
                route: Route::NewCall,
                entry: next,
            },
        ))
    }

    /// Replace a contact's fields, then refetch the list.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Validation` if the phone number is blank, or
    /// `FlowError::Remote` if the request failed.
    pub async fn update(&self, id: &ContactId, form: &ContactForm) -> Result<Contact> {
        require(&self.session, Action::ManageContacts)?;
        let patch = form.to_patch()?;
        let contact = self
            .gateway
            .update_contact(id, &patch)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to update contact"))?;
        self.refetch().await;
        Ok(contact)
    }

    /// Delete a contact, then refetch the list.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Remote` if the request failed.
    pub async fn delete(&self, id: &ContactId) -> Result<()> {
        require(&self.session, Action::ManageContacts)?;
        self.gateway
            .delete_contact(id)
            .await
            .map_err(|e| FlowError::remote(&e, "Failed to delete contact"))?;
        tracing::info!(contact_id = %id, "Contact deleted");
        self.refetch().await;
        Ok(())
    }

    async fn refetch(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh contacts");
        }
    }
}

async fn fetch(gateway: &dyn Gateway, filter: &ContactFilter) -> Result<Vec<Contact>> {
    gateway
        .list_contacts(filter)
        .await
        .map_err(|e| FlowError::remote(&e, "Failed to load contacts"))
}
