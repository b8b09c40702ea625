//! Renders a loan statement as a standalone HTML document.
//!
//! The statement has no external stylesheets or scripts so it can be saved,
//! printed and shared as a single file. Rendering is pure: the same loan,
//! returns and dates always give the same bytes.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use time::Date;

use crate::{
    Error,
    finance::{FinanceRecord, LoanTerms},
    html::or_fallback,
    ledger::{LoanReturn, loan_balance},
    money::Money,
};

const STATEMENT_STYLE: &str = "
body { font-family: Arial, Helvetica, sans-serif; color: #2c3e50; max-width: 800px; margin: 0 auto; padding: 20px; }
.header { text-align: center; border-bottom: 3px solid #2c3e50; padding-bottom: 20px; margin-bottom: 30px; }
.header h1 { margin: 0 0 8px; }
.subtitle { color: #7f8c8d; font-size: 14px; }
.section { margin-bottom: 30px; }
.section-title { font-size: 18px; border-bottom: 2px solid #3498db; padding-bottom: 6px; }
.info-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; }
.info-label { font-size: 12px; color: #7f8c8d; text-transform: uppercase; }
.info-value { font-size: 15px; font-weight: bold; }
.summary-row { display: flex; justify-content: space-between; padding: 8px 0; border-bottom: 1px solid #dee2e6; }
.summary-value { font-weight: bold; }
table { width: 100%; border-collapse: collapse; }
th { background-color: #2c3e50; color: #fff; padding: 10px 12px; text-align: left; }
td { padding: 10px 12px; border-bottom: 1px solid #dee2e6; }
.terms p { font-size: 13px; line-height: 1.5; }
.footer { margin-top: 25px; font-size: 11px; color: #6c757d; text-align: center; border-top: 1px dotted #ccc; padding: 10px; }
";

/// The file name a statement is downloaded as, e.g.
/// "Loan_Details_Imran_Ali_2025-03-01.html".
///
/// Runs of whitespace in the recipient's name become a single underscore and
/// any other character that is not an ASCII letter, digit, '-' or '_' is
/// dropped so the name is safe in a Content-Disposition header.
pub fn statement_file_name(recipient_name: &str, generated_on: Date) -> String {
    let name = recipient_name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let name = if name.is_empty() { "Loan" } else { name.as_str() };

    format!("Loan_Details_{name}_{generated_on}.html")
}

/// Renders the statement for `loan` and its `returns`.
///
/// The returns are listed oldest first regardless of the order they are
/// given in. The summary's remaining amount is the loan's ledger balance,
/// i.e., the amount owed when the loan was entered less every return.
///
/// # Errors
/// Returns [Error::NotALoan] if `loan` is an expense.
pub fn render_loan_statement(
    loan: &FinanceRecord,
    returns: &[LoanReturn],
    generated_on: Date,
    organisation_name: &str,
) -> Result<String, Error> {
    let terms = loan.loan_terms().ok_or(Error::NotALoan(loan.id))?;

    let mut returns: Vec<&LoanReturn> = returns.iter().collect();
    returns.sort_by_key(|loan_return| (loan_return.return_date, loan_return.id));

    let total_returned: Money = returns.iter().map(|loan_return| loan_return.return_amount).sum();
    let balance = loan_balance(terms, total_returned, generated_on);
    let returned_before_entry = loan.total_amount - terms.opening_balance;

    let document = html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                title { "Loan Statement - " (loan.recipient_name) }
                style { (PreEscaped(STATEMENT_STYLE)) }
            }

            body
            {
                div class="header"
                {
                    h1 { (organisation_name) " Loan Statement" }
                    div class="subtitle" { "Generated on: " (generated_on) }
                }

                div class="section"
                {
                    h2 class="section-title" { "Loan Information" }

                    div class="info-grid"
                    {
                        (info_item("Recipient", &loan.recipient_name))
                        (info_item("Mobile Number", or_fallback(loan.mobile_no.as_deref(), "Not Provided")))
                        (info_item("Loan Date", &loan.record_date.to_string()))
                        (info_item("Purpose", &loan.purpose))
                        (info_item("Category", &loan.category))
                        (info_item("Payment Method", loan.payment_method.label()))
                        (info_item("Remarks", or_fallback(loan.remarks.as_deref(), "None")))
                    }
                }

                (terms_section(terms))

                div class="section"
                {
                    h2 class="section-title" { "Financial Summary" }

                    (summary_row("original-amount", "Original Amount", &loan.total_amount.to_string()))
                    @if returned_before_entry.is_positive() {
                        (summary_row("returned-before-entry", "Returned Before Entry", &returned_before_entry.to_string()))
                    }
                    (summary_row("total-returned", "Total Returned", &balance.total_returned.to_string()))
                    (summary_row("remaining", "Remaining", &balance.remaining.to_string()))
                    (summary_row("status", "Status", balance.status.label()))
                }

                div class="section"
                {
                    h2 class="section-title" { "Payment History" }

                    @if returns.is_empty() {
                        p { "No payments have been made." }
                    } @else {
                        table
                        {
                            thead
                            {
                                tr
                                {
                                    th { "Payment Date" }
                                    th { "Amount" }
                                    th { "Payment Method" }
                                    th { "Remaining After Payment" }
                                    th { "Remarks" }
                                }
                            }

                            tbody
                            {
                                @for loan_return in &returns {
                                    tr
                                    {
                                        td { (loan_return.return_date) }
                                        td { (loan_return.return_amount) }
                                        td
                                        {
                                            (loan_return
                                                .payment_method
                                                .map(|method| method.label())
                                                .unwrap_or("Not Specified"))
                                        }
                                        td { (loan_return.remaining_after_return) }
                                        td { (or_fallback(loan_return.remarks.as_deref(), "-")) }
                                    }
                                }
                            }
                        }
                    }
                }

                div class="section terms"
                {
                    h2 class="section-title" { "Terms & Conditions" }
                    p { "1. This document is a record of the loan agreement and payments between " (organisation_name) " and the borrower." }
                    p { "2. All payments listed have been entered in the foundation's records." }
                    p { "3. The borrower acknowledges receipt of the loan amount and agrees to the repayment terms." }
                    p { "4. Any disputes regarding this loan should be raised with the foundation within 30 days." }
                }

                div class="footer" { "Generated by the " (organisation_name) " record system." }
            }
        }
    };

    Ok(document.into_string())
}

fn info_item(label: &str, value: &str) -> Markup {
    html! {
        div
        {
            div class="info-label" { (label) }
            div class="info-value" { (value) }
        }
    }
}

fn summary_row(id: &str, label: &str, value: &str) -> Markup {
    html! {
        div class="summary-row"
        {
            span { (label) }
            span id=(id) class="summary-value" { (value) }
        }
    }
}

fn terms_section(terms: &LoanTerms) -> Markup {
    let not_specified = || "Not Specified".to_owned();

    html! {
        div class="section"
        {
            h2 class="section-title" { "Loan Terms" }

            div class="info-grid"
            {
                (info_item(
                    "Repayment Type",
                    terms.repayment_type.map(|repayment_type| repayment_type.label()).unwrap_or("Not Specified"),
                ))
                (info_item("Interest Rate", &format!("{}%", terms.interest_rate.normalize())))
                (info_item(
                    "Expected Return Date",
                    &terms.return_date.map(|date| date.to_string()).unwrap_or_else(not_specified),
                ))
                (info_item(
                    "Installment Amount",
                    &terms.installment_amount.map(|amount| amount.to_string()).unwrap_or_else(not_specified),
                ))
                (info_item(
                    "Number of Installments",
                    &terms.total_installments.map(|count| count.to_string()).unwrap_or_else(not_specified),
                ))
                (info_item("Collateral", or_fallback(terms.collateral.as_deref(), "None")))
            }
        }
    }
}
