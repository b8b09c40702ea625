//! Donations: registering them, listing donors by mobile number and showing
//! the history of one donor.

mod core;
mod create;
mod history;
mod list;

pub use core::{
    Donor, NewDonor, count_donors, create_donor, create_donor_table, get_recent_donors,
    get_total_donations,
};
pub use create::{create_donor_endpoint, get_new_donor_page};
pub use history::get_donor_history_page;
pub use list::get_donors_page;

#[cfg(test)]
pub(crate) use core::{get_all_donors, get_donors_by_mobile, test_helpers};
