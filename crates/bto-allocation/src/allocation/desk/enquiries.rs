use std::collections::btree_map::Entry;

use chrono::NaiveDate;
use tracing::info;

use super::{AllocationDesk, DeskError};
use crate::allocation::eligibility;
use crate::allocation::enquiry::{Enquiry, EnquiryId, EnquiryReply};
use crate::allocation::identity::{Identity, Role};
use crate::allocation::policy::Denial;
use crate::storage::AllocationStore;

impl<S> AllocationDesk<S>
where
    S: AllocationStore + 'static,
{
    /// Records a question. The project may be free text, but naming a project the
    /// author cannot see is refused.
    pub fn submit_enquiry(
        &mut self,
        author: &Identity,
        project: &str,
        text: &str,
        today: NaiveDate,
    ) -> Result<Enquiry, DeskError> {
        let user = self.user(author)?;
        if user.is_manager() {
            return Err(Denial::RoleNotPermitted {
                role: user.role(),
                action: "submit enquiries",
            }
            .into());
        }
        let text = non_empty(text)?;

        let project = match self.data.project_named(project) {
            Some(known) if !eligibility::is_visible(user, known, &self.data) => {
                return Err(Denial::ProjectNotVisible(known.name.clone()).into());
            }
            Some(known) => known.name.to_string(),
            None => project.trim().to_string(),
        };

        let id = self.sequence.next_id();
        let Entry::Vacant(slot) = self.data.enquiries.entry(id) else {
            return Err(Denial::EnquiryIdTaken(id).into());
        };
        let enquiry = Enquiry {
            id,
            author: author.clone(),
            project,
            text,
            submitted_on: today,
            reply: None,
        };
        slot.insert(enquiry.clone());
        self.persist_enquiries()?;

        info!(enquiry = %enquiry.id, author = %author, project = %enquiry.project, "enquiry submitted");
        Ok(enquiry)
    }

    pub fn edit_enquiry(
        &mut self,
        author: &Identity,
        id: EnquiryId,
        text: &str,
    ) -> Result<Enquiry, DeskError> {
        let text = non_empty(text)?;
        self.editable_enquiry(author, id)?;

        let Some(enquiry) = self.data.enquiries.get_mut(&id) else {
            return Err(Denial::EnquiryNotFound(id).into());
        };
        enquiry.text = text;
        let updated = enquiry.clone();

        self.persist_enquiries()?;
        info!(enquiry = %id, author = %author, "enquiry edited");
        Ok(updated)
    }

    pub fn delete_enquiry(&mut self, author: &Identity, id: EnquiryId) -> Result<Enquiry, DeskError> {
        self.editable_enquiry(author, id)?;

        let Some(removed) = self.data.enquiries.remove(&id) else {
            return Err(Denial::EnquiryNotFound(id).into());
        };
        self.persist_enquiries()?;
        info!(enquiry = %id, author = %author, "enquiry deleted");
        Ok(removed)
    }

    /// Only the author may change an enquiry, and only before it is answered.
    fn editable_enquiry(&self, author: &Identity, id: EnquiryId) -> Result<&Enquiry, Denial> {
        let enquiry = self
            .data
            .enquiries
            .get(&id)
            .ok_or(Denial::EnquiryNotFound(id))?;
        if &enquiry.author != author {
            return Err(Denial::NotEnquiryAuthor(id));
        }
        if enquiry.is_replied() {
            return Err(Denial::EnquiryAnswered(id));
        }
        Ok(enquiry)
    }

    /// Answers an enquiry once.
    ///
    /// The owning manager or an approved officer of the named project may reply;
    /// enquiries about unknown projects are open to any manager.
    pub fn reply_enquiry(
        &mut self,
        responder: &Identity,
        id: EnquiryId,
        text: &str,
        today: NaiveDate,
    ) -> Result<Enquiry, DeskError> {
        let text = non_empty(text)?;
        let user = self.user(responder)?;
        let enquiry = self
            .data
            .enquiries
            .get(&id)
            .ok_or(Denial::EnquiryNotFound(id))?;
        if enquiry.is_replied() {
            return Err(Denial::EnquiryAnswered(id).into());
        }

        match (self.data.project_named(&enquiry.project), user.role()) {
            (Some(project), Role::Manager) if project.manager != *responder => {
                return Err(Denial::NotProjectManager(project.name.clone()).into());
            }
            (Some(project), Role::Officer)
                if !self.data.is_approved_officer(responder, &project.name) =>
            {
                return Err(Denial::NotHandlingOfficer(project.name.clone()).into());
            }
            (Some(_), Role::Manager | Role::Officer) | (None, Role::Manager) => {}
            (_, role) => {
                return Err(Denial::RoleNotPermitted {
                    role,
                    action: "reply to this enquiry",
                }
                .into());
            }
        }

        let Some(enquiry) = self.data.enquiries.get_mut(&id) else {
            return Err(Denial::EnquiryNotFound(id).into());
        };
        enquiry.reply = Some(EnquiryReply {
            text,
            replied_by: responder.clone(),
            replied_on: today,
        });
        let updated = enquiry.clone();

        self.persist_enquiries()?;
        info!(enquiry = %id, responder = %responder, "enquiry answered");
        Ok(updated)
    }

    /// Managers see every enquiry, officers their own plus those for projects they
    /// handle, applicants only their own.
    pub fn enquiries_for(&self, viewer: &Identity) -> Result<Vec<Enquiry>, DeskError> {
        let user = self.user(viewer)?;

        Ok(self
            .data
            .enquiries
            .values()
            .filter(|enquiry| match user.role() {
                Role::Manager => true,
                Role::Officer => {
                    &enquiry.author == viewer
                        || self
                            .data
                            .project_named(&enquiry.project)
                            .map(|project| self.data.is_approved_officer(viewer, &project.name))
                            .unwrap_or(false)
                }
                Role::Applicant => &enquiry.author == viewer,
            })
            .cloned()
            .collect())
    }
}

fn non_empty(text: &str) -> Result<String, Denial> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Denial::EmptyEnquiry);
    }
    Ok(text.to_string())
}
