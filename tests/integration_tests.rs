use chrono::NaiveDate;
use monthly_mis_builder::*;

fn month(s: &str) -> PeriodKey {
    s.parse().unwrap()
}

fn journal(date: (i32, u32, u32), voucher: &str, description: &str, amount: f64) -> JournalEntry {
    JournalEntry {
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        voucher_id: voucher.to_string(),
        account_description: description.to_string(),
        amount,
        jurisdiction: "HQ".to_string(),
    }
}

fn sale(date: (i32, u32, u32), channel: &str, taxable: f64, tax: f64) -> SalesEntry {
    SalesEntry {
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        invoice_id: format!("INV-{}-{}", date.1, date.2),
        jurisdiction: "HQ".to_string(),
        channel: channel.to_string(),
        taxable_amount: taxable,
        tax_amount: tax,
    }
}

fn amazon_fee_rule() -> ClassificationRule {
    ClassificationRule::new(
        "amazon-fee",
        "amazon.*fee",
        MatchMode::Regex,
        Head::ChannelFulfillment,
        "Amazon Fees",
        1,
    )
    .unwrap()
}

#[test]
fn test_end_to_end_amazon_fee() {
    let mut store = MisStore::with_rules(MisConfig::default(), vec![amazon_fee_rule()]);
    let april = month("2024-04");

    store.store_transactions(
        april,
        vec![journal((2024, 4, 30), "JV-1", "Amazon Seller Fee", 5000.0)],
        StoreMode::Append,
    );

    let record = store.get(april).unwrap();
    assert!((record.classification.head_total(Head::ChannelFulfillment) - 5000.0).abs() < 0.01);
    assert!(
        (record
            .classification
            .subhead_total(Head::ChannelFulfillment, "Amazon Fees")
            - 5000.0)
            .abs()
            < 0.01
    );
    assert_eq!(record.computed.unclassified_count, 0);
    let rule_match = record.classified[0].rule_match.as_ref().unwrap();
    assert_eq!(rule_match.rule_id, "amazon-fee");
}

#[test]
fn test_reclassification_creates_top_priority_rule() {
    let office = ClassificationRule::new(
        "payments",
        "payment to",
        MatchMode::Substring,
        Head::OperatingExpenses,
        "Office Expenses",
        0,
    )
    .unwrap();
    let mut rules = default_system_rules();
    rules.push(office);
    let mut store = MisStore::with_rules(MisConfig::default(), rules);

    let april = month("2024-04");
    store.store_transactions(
        april,
        vec![journal((2024, 4, 12), "JV-7", "Payment to XYZ Ltd", 10_000.0)],
        StoreMode::Append,
    );
    let txn = &store.get(april).unwrap().classified[0];
    assert_eq!(txn.effective().unwrap().head, Head::OperatingExpenses);
    let txn_id = txn.id;

    let outcome = store
        .reclassify_transaction(
            april,
            ReclassifyRequest {
                txn_id,
                head: Head::SalesMarketing,
                subhead: "Influencer Marketing".to_string(),
                create_rule: true,
                pattern: Some("XYZ Ltd".to_string()),
            },
        )
        .unwrap();

    assert_eq!(outcome.previous.unwrap().head, Head::OperatingExpenses);
    let rule = outcome.created_rule.unwrap();
    assert_eq!(rule.source, RuleSource::Reclassification);
    assert_eq!(rule.pattern, "XYZ Ltd");
    assert!(store
        .rules()
        .iter()
        .filter(|r| r.id != rule.id)
        .all(|r| rule.priority < r.priority));

    let txn = store.get(april).unwrap().transaction(txn_id).unwrap();
    assert_eq!(txn.rule_match.as_ref().unwrap().rule_id, rule.id);
    assert!(txn.manual_override.is_some());
    // the new rule now agrees with the manual choice
    assert!(!txn.is_reassigned());

    // a later entry for the same party follows the new rule
    let may = month("2024-05");
    store.store_transactions(
        may,
        vec![journal((2024, 5, 3), "JV-9", "Payment to XYZ Ltd - May retainer", 4_000.0)],
        StoreMode::Append,
    );
    let record = store.get(may).unwrap();
    let txn = &record.classified[0];
    assert!(txn.manual_override.is_none());
    assert_eq!(txn.effective().unwrap().head, Head::SalesMarketing);
    assert_eq!(txn.effective().unwrap().subhead, "Influencer Marketing");
    assert!((record.classification.head_total(Head::SalesMarketing) - 4_000.0).abs() < 0.01);
}

#[test]
fn test_three_month_range_uses_first_and_last_stock() {
    let mut store = MisStore::default();
    let jan = month("2024-01");
    let mar = month("2024-03");

    store.store_balance_sheet(jan, "HQ", BalanceSheetSnapshot::new("HQ").with_stock(100.0, 30.0, 80.0));
    store.store_balance_sheet(mar, "HQ", BalanceSheetSnapshot::new("HQ").with_stock(70.0, 20.0, 40.0));

    let agg = store.aggregate(jan, mar);
    assert!((agg.stock.opening_stock - 100.0).abs() < 0.01);
    assert!((agg.stock.closing_stock - 40.0).abs() < 0.01);
    assert!((agg.stock.purchases - 50.0).abs() < 0.01);
    assert!((agg.raw_material_cost - 110.0).abs() < 0.01);
    assert_eq!(agg.included_months, vec![jan, mar]);
    assert_eq!(agg.missing_months, vec![month("2024-02")]);

    let availability = store.availability_for_range(jan, mar);
    assert_eq!(availability.len(), 3);
    assert!(!availability[1].has_data());
}

#[test]
fn test_replace_versus_append() {
    let mut store = MisStore::default();
    let april = month("2024-04");
    let entries = |n: usize| -> Vec<JournalEntry> {
        (0..n)
            .map(|i| journal((2024, 4, 1), &format!("JV-{}", i), "Office Rent", 100.0))
            .collect()
    };

    store.store_transactions(april, entries(10), StoreMode::Append);
    store.store_transactions(april, entries(3), StoreMode::Replace);
    assert_eq!(store.get(april).unwrap().journal_entries.len(), 3);

    store.store_transactions(april, entries(10), StoreMode::Replace);
    store.store_transactions(april, entries(3), StoreMode::Append);
    assert_eq!(store.get(april).unwrap().journal_entries.len(), 13);
}

#[test]
fn test_invalid_regex_does_not_break_classification() {
    let broken = ClassificationRule::new(
        "broken",
        "amazon(fee",
        MatchMode::Regex,
        Head::ChannelFulfillment,
        "Amazon Fees",
        0,
    )
    .unwrap();
    let mut store = MisStore::with_rules(MisConfig::default(), vec![broken, amazon_fee_rule()]);
    assert_eq!(store.rule_set().invalid_rule_ids(), ["broken".to_string()]);

    let april = month("2024-04");
    store.store_transactions(
        april,
        vec![journal((2024, 4, 30), "JV-1", "Amazon Seller Fee", 750.0)],
        StoreMode::Append,
    );
    let record = store.get(april).unwrap();
    assert_eq!(record.classified[0].rule_match.as_ref().unwrap().rule_id, "amazon-fee");
    assert!((record.classification.head_total(Head::ChannelFulfillment) - 750.0).abs() < 0.01);
}

#[test]
fn test_zero_revenue_month_has_zero_percentages() {
    let mut store = MisStore::with_rules(MisConfig::default(), default_system_rules());
    let april = month("2024-04");
    store.store_transactions(
        april,
        vec![journal((2024, 4, 30), "JV-1", "Office Rent", 25_000.0)],
        StoreMode::Append,
    );

    let w = &store.get(april).unwrap().computed.waterfall;
    assert_eq!(w.net_revenue, 0.0);
    assert!((w.ebitda + 25_000.0).abs() < 0.01);
    let p = w.percentages;
    for pct in [
        p.cogm_pct,
        p.gross_margin_pct,
        p.cm1_pct,
        p.cm2_pct,
        p.cm3_pct,
        p.ebitda_pct,
        p.ebt_pct,
        p.net_income_pct,
    ] {
        assert_eq!(pct, 0.0);
    }
}

#[test]
fn test_waterfall_steps_are_consistent() {
    let mut store = MisStore::with_rules(MisConfig::default(), default_system_rules());
    let april = month("2024-04");
    store.store_balance_sheet(
        april,
        "HQ",
        BalanceSheetSnapshot::new("HQ").with_stock(50_000.0, 20_000.0, 45_000.0),
    );
    store.store_transactions(
        april,
        vec![
            sale((2024, 4, 3), "Amazon", 80_000.0, 14_400.0),
            sale((2024, 4, 9), "Website", 20_000.0, 3_600.0),
            sale((2024, 4, 20), "Stock Transfer", 15_000.0, 0.0),
        ],
        StoreMode::Append,
    );
    store.store_transactions(
        april,
        vec![
            journal((2024, 4, 30), "JV-1", "Salaries payable", 12_000.0),
            journal((2024, 4, 30), "JV-2", "Bank interest paid", 1_000.0),
            journal((2024, 4, 30), "JV-3", "Depreciation for the month", 2_000.0),
        ],
        StoreMode::Append,
    );

    let record = store.get(april).unwrap();
    let w = &record.computed.waterfall;
    assert!((record.computed.gross_revenue - 100_000.0).abs() < 0.01);
    assert!((record.computed.stock_transfers - 15_000.0).abs() < 0.01);
    assert!((record.computed.output_tax - 18_000.0).abs() < 0.01);
    assert!((w.cogm - 25_000.0).abs() < 0.01);
    assert_eq!(w.net_revenue - w.cogm, w.gross_margin);
    assert_eq!(w.gross_margin - w.channel_fulfillment, w.cm1);
    assert_eq!(w.cm1 - w.sales_marketing, w.cm2);
    assert_eq!(w.cm2 - w.platform_costs, w.cm3);
    assert_eq!(w.cm3 - w.operating_expenses, w.ebitda);
    assert_eq!(w.ebitda - (w.interest + w.depreciation + w.amortization), w.ebt);
    assert_eq!(w.ebt - w.income_tax, w.net_income);
    assert!((w.ebt - 60_000.0).abs() < 0.01);

    let statement = store.monthly_statement(april).unwrap();
    let csv = statement.to_csv(store.config().currency_precision);
    assert!(csv.contains("EBT,60000.00,60.00"));
}

#[test]
fn test_fiscal_year_roll_up() {
    let mut store = MisStore::default();
    // FY 2024-25 runs April 2024 to March 2025
    for (m, amount) in [("2024-03", 999.0), ("2024-04", 1_000.0), ("2025-03", 2_000.0), ("2025-04", 999.0)] {
        let key = month(m);
        store.store_transactions(
            key,
            vec![sale((key.year(), key.month(), 1), "Flipkart", amount, 0.0)],
            StoreMode::Append,
        );
    }

    let fy = store.aggregate_fiscal_year(2024).unwrap();
    assert_eq!(fy.start, month("2024-04"));
    assert_eq!(fy.end, month("2025-03"));
    assert_eq!(fy.included_months, vec![month("2024-04"), month("2025-03")]);
    assert!((fy.subhead_total(Head::Revenue, "Flipkart") - 3_000.0).abs() < 0.01);
    assert_eq!(fy.missing_months.len(), 10);
}

#[test]
fn test_persistence_round_trip() {
    let path = std::env::temp_dir().join(format!(
        "monthly_mis_builder_it_{}.json",
        std::process::id()
    ));
    let backend = JsonFilePersistence::new(&path);
    let april = month("2024-04");

    let mut store = MisStore::with_rules(MisConfig::default(), vec![amazon_fee_rule()]);
    store.store_transactions(
        april,
        vec![
            journal((2024, 4, 30), "JV-1", "Amazon Seller Fee", 5000.0),
            journal((2024, 4, 30), "JV-2", "Misc vendor", 300.0),
        ],
        StoreMode::Append,
    );
    store
        .reclassify_transaction(
            april,
            ReclassifyRequest {
                txn_id: TxnId(2),
                head: Head::OperatingExpenses,
                subhead: "Office Expenses".to_string(),
                create_rule: false,
                pattern: None,
            },
        )
        .unwrap();
    store.save_to(&backend).unwrap();

    let mut restored = MisStore::default();
    restored.load_from(&backend).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored.rules().len(), 1);
    let record = restored.get(april).unwrap();
    assert_eq!(record, store.get(april).unwrap());
    assert!((record.classification.head_total(Head::OperatingExpenses) - 300.0).abs() < 0.01);

    // ids keep counting after a reload
    restored.store_transactions(
        april,
        vec![journal((2024, 4, 30), "JV-3", "Amazon Seller Fee", 1.0)],
        StoreMode::Append,
    );
    assert_eq!(restored.get(april).unwrap().journal_entries[2].id, TxnId(3));
}

#[test]
fn test_csv_register_with_lenient_amounts() {
    let register = "\
date,voucher_id,account_description,amount,jurisdiction
2024-04-02,JV-11,Amazon Seller Fee,\"1,250.50\",HQ
2024-04-03,JV-12,Amazon Seller Fee reversal,(200),HQ
2024-04-04,JV-13,Amazon Seller Fee,n/a,HQ
2024-04-05,JV-14,Amazon Seller Fee,,HQ
";
    let mut reader = csv::Reader::from_reader(register.as_bytes());
    let entries: Vec<JournalEntry> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 4);
    assert!((entries[0].amount - 1250.5).abs() < 0.01);
    assert!((entries[1].amount + 200.0).abs() < 0.01);
    assert_eq!(entries[2].amount, 0.0);
    assert_eq!(entries[3].amount, 0.0);

    let mut store = MisStore::with_rules(MisConfig::default(), vec![amazon_fee_rule()]);
    let april = month("2024-04");
    store.store_transactions(april, entries, StoreMode::Replace);

    let record = store.get(april).unwrap();
    // the credit reversal stays visible but does not net against the fee
    assert!((record.classification.head_total(Head::ChannelFulfillment) - 1250.5).abs() < 0.01);
    assert_eq!(
        record
            .transactions_for(Head::ChannelFulfillment, "Amazon Fees")
            .len(),
        4
    );
}

#[test]
fn test_parsed_batch_json_ingest() -> anyhow::Result<()> {
    let json = r#"{
        "month": "2024-06",
        "journal_entries": [
            {"date": "2024-06-30", "voucher_id": "JV-1", "account_description": "Amazon Seller Fee", "amount": "₹ 2,000", "jurisdiction": "HQ"}
        ],
        "sales_entries": [
            {"date": "2024-06-10", "invoice_id": "INV-9", "jurisdiction": "HQ", "channel": "Amazon IN", "taxable_amount": 9000, "tax_amount": "1,620"}
        ],
        "balance_sheets": [
            {"jurisdiction": "HQ", "opening_stock": "5,000", "purchases": 2000, "closing_stock": null}
        ]
    }"#;
    let batch: ParsedDocumentBatch = serde_json::from_str(json)?;
    let store = process_document_batches(MisConfig::default(), vec![amazon_fee_rule()], vec![batch])?;

    let record = store
        .get(month("2024-06"))
        .ok_or_else(|| anyhow::anyhow!("month not stored"))?;
    assert!((record.computed.gross_revenue - 9_000.0).abs() < 0.01);
    assert!((record.computed.output_tax - 1_620.0).abs() < 0.01);
    assert!((record.computed.raw_material_cost - 7_000.0).abs() < 0.01);
    assert!((record.classification.head_total(Head::ChannelFulfillment) - 2_000.0).abs() < 0.01);
    Ok(())
}
