//! Stat cards and the recent activity table.

use maud::{Markup, html};

use crate::{
    dashboard::stats::{Activity, DashboardStats},
    html::{
        BADGE_STYLE, CARD_STYLE, LINK_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, TABLE_STYLE,
    },
};

fn stat_card(id: &str, label: &str, value: &str, detail: Option<&str>) -> Markup {
    html! {
        div class=(CARD_STYLE)
        {
            p class="text-sm text-gray-500 dark:text-gray-400" { (label) }
            p id=(id) class="text-2xl font-semibold" { (value) }

            @if let Some(detail) = detail {
                p class="text-xs text-gray-500 dark:text-gray-400 mt-1" { (detail) }
            }
        }
    }
}

pub(super) fn stats_cards_view(stats: &DashboardStats) -> Markup {
    let donor_detail = format!("{} donations", stats.donor_count);
    let loan_detail = format!("{} loans", stats.loan_count);
    let expense_detail = format!("{} expenses", stats.expense_count);

    html! {
        section class="grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 gap-4 mb-8"
        {
            (stat_card("total-funds", "Total funds received", &stats.total_funds.to_string(), Some(&donor_detail)))
            (stat_card("total-loans", "Total loans given", &stats.total_loans.to_string(), Some(&loan_detail)))
            (stat_card("total-expenses", "Total expenses", &stats.total_expenses.to_string(), Some(&expense_detail)))
            (stat_card("outstanding-loans", "Outstanding loans", &stats.outstanding_loans.to_string(), None))
            (stat_card("available-balance", "Available balance", &stats.available_balance.to_string(), None))
            (stat_card(
                "recovery-rate",
                "Loan recovery",
                &format!("{}%", stats.recovery_rate),
                Some(&format!("Funds utilised: {}%", stats.utilisation_rate)),
            ))
        }
    }
}

pub(super) fn recent_activity_view(activity: &[Activity]) -> Markup {
    html! {
        section class="w-full"
        {
            h2 class="text-xl font-semibold mb-4" { "Recent activity" }

            @if activity.is_empty() {
                p { "Nothing has been recorded yet." }
            } @else {
                div class="relative overflow-x-auto shadow-md sm:rounded-lg"
                {
                    table id="recent-activity" class=(TABLE_STYLE)
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            }
                        }

                        tbody
                        {
                            @for row in activity {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td class=(TABLE_CELL_STYLE) { span class=(BADGE_STYLE) { (row.kind.label()) } }
                                    td class=(TABLE_CELL_STYLE) { a href=(row.url) class=(LINK_STYLE) { (row.name) } }
                                    td class=(TABLE_CELL_STYLE) { (row.amount) }
                                    td class=(TABLE_CELL_STYLE) { (row.date) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
