use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::macros::date;

use foundation_ledger::{
    LoanTerms, Money, NewDonor, NewFinanceRecord, NewLoanReturn, PaymentMethod, RecordKind,
    RepaymentType, create_donor, create_finance_record, initialize_db, record_return,
};

/// A utility for creating a test database for the foundation_ledger server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating donors...");

    let donors = [
        ("Ayesha Khan", "0300-1234567", PaymentMethod::BankTransfer, 25_000, "Zakat", date!(2025 - 01 - 05)),
        ("Ayesha Khan", "0300 1234567", PaymentMethod::Easypaisa, 10_000, "Sadaqah", date!(2025 - 02 - 11)),
        ("Bilal Ahmed", "0333-7654321", PaymentMethod::Cash, 5_000, "General", date!(2025 - 01 - 20)),
        ("Fatima Noor", "0345-1112223", PaymentMethod::JazzCash, 15_000, "Education", date!(2025 - 03 - 02)),
        ("F. Noor", "+92 345 1112223", PaymentMethod::Cheque, 20_000, "Zakat", date!(2025 - 04 - 14)),
    ];

    for (name, mobile_no, payment_method, amount, purpose, donation_date) in donors {
        create_donor(
            NewDonor {
                name: name.to_owned(),
                mobile_no: mobile_no.to_owned(),
                payment_method,
                total_amount: Money::from_whole(amount),
                purpose: purpose.to_owned(),
                remarks: None,
                donation_date,
            },
            &conn,
        )?;
    }

    println!("Creating loans and expenses...");

    let installment_loan = create_finance_record(
        NewFinanceRecord {
            recipient_name: "Imran Ali".to_owned(),
            mobile_no: Some("0321-5550000".to_owned()),
            total_amount: Money::from_whole(30_000),
            purpose: "Stock for a vegetable cart".to_owned(),
            category: "Other".to_owned(),
            payment_method: PaymentMethod::Cash,
            remarks: None,
            record_date: date!(2025 - 02 - 01),
            kind: RecordKind::Loan(LoanTerms {
                repayment_type: Some(RepaymentType::Installment),
                return_date: Some(date!(2026 - 02 - 01)),
                interest_rate: Decimal::ZERO,
                installment_amount: Some(Money::from_whole(2_500)),
                total_installments: Some(12),
                opening_balance: Money::from_whole(30_000),
                collateral: None,
            }),
        },
        &conn,
    )?;

    let overdue_loan = create_finance_record(
        NewFinanceRecord {
            recipient_name: "Saima Bibi".to_owned(),
            mobile_no: Some("0312-9998887".to_owned()),
            total_amount: Money::from_whole(8_000),
            purpose: "School fees".to_owned(),
            category: "Education".to_owned(),
            payment_method: PaymentMethod::JazzCash,
            remarks: Some("To be returned after harvest".to_owned()),
            record_date: date!(2025 - 03 - 10),
            kind: RecordKind::Loan(LoanTerms {
                repayment_type: Some(RepaymentType::OneTime),
                return_date: Some(date!(2025 - 06 - 30)),
                interest_rate: Decimal::ZERO,
                installment_amount: None,
                total_installments: None,
                opening_balance: Money::from_whole(8_000),
                collateral: Some("Gold ring".to_owned()),
            }),
        },
        &conn,
    )?;

    let expenses = [
        ("Al-Shifa Pharmacy", None, 3_200, "Medicine for widows' families", "Medical", date!(2025 - 02 - 15)),
        ("Ration packs", None, 12_000, "Monthly ration drive", "Food & Ration", date!(2025 - 03 - 01)),
        ("Imran Ali", Some("0321 5550000"), 1_500, "Cart repair", "Emergency", date!(2025 - 03 - 20)),
    ];

    for (recipient_name, mobile_no, amount, purpose, category, record_date) in expenses {
        create_finance_record(
            NewFinanceRecord {
                recipient_name: recipient_name.to_owned(),
                mobile_no: mobile_no.map(str::to_owned),
                total_amount: Money::from_whole(amount),
                purpose: purpose.to_owned(),
                category: category.to_owned(),
                payment_method: PaymentMethod::Cash,
                remarks: None,
                record_date,
                kind: RecordKind::Expense,
            },
            &conn,
        )?;
    }

    println!("Recording loan returns...");

    let returns = [
        (installment_loan.id, 2_500, date!(2025 - 03 - 01)),
        (installment_loan.id, 2_500, date!(2025 - 04 - 01)),
        (overdue_loan.id, 3_000, date!(2025 - 06 - 15)),
    ];

    for (loan_id, amount, return_date) in returns {
        record_return(
            loan_id,
            NewLoanReturn {
                return_amount: Money::from_whole(amount),
                return_date,
                payment_method: Some(PaymentMethod::Cash),
                remarks: None,
            },
            None,
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
