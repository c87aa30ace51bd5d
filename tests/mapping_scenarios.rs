use invoice_mapper::mapping::fingerprint::{column_index_to_letter, fingerprint};
use invoice_mapper::mapping::keywords::KeywordTable;
use invoice_mapper::mapping::patterns::PatternLibrary;
use invoice_mapper::mapping::strategies::{KeywordStrategy, MatchInput, PatternStrategy, Strategy};
use invoice_mapper::models::LearnedMappings;
use invoice_mapper::{FieldKey, LearnedMapping, MappingConfig, MappingEngine, StrategyId};
use pretty_assertions::assert_eq;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const INVOICE_HEADERS: [&str; 9] = [
    "Тип на документ",
    "Број на документ",
    "Дата на документ",
    "Продавач",
    "Купувач",
    "Опис во документ",
    "Нето износ",
    "ДДВ 18%",
    "Бруто износ",
];

#[test]
fn invoice_template_maps_by_keywords_alone() {
    let engine = MappingEngine::default();
    let headers = strings(&INVOICE_HEADERS);
    let result = engine.map_columns(&headers, &[], &LearnedMappings::new(), &FieldKey::ALL);

    let expected = [
        ("A", FieldKey::DocumentType),
        ("B", FieldKey::InvoiceNumber),
        ("C", FieldKey::Date),
        ("D", FieldKey::SellerName),
        ("E", FieldKey::BuyerName),
        ("F", FieldKey::Description),
        ("G", FieldKey::NetAmount),
        ("H", FieldKey::TaxAmount),
        ("I", FieldKey::TotalAmount),
    ];
    assert_eq!(result.len(), expected.len());
    for (column, field) in expected {
        assert_eq!(result.field_for(column), Some(field), "column {}", column);
        let confidence = result.confidence_of(column).unwrap();
        assert!(confidence >= 0.85, "column {} confidence {}", column, confidence);
    }
}

#[test]
fn mapping_is_deterministic() {
    let engine = MappingEngine::default();
    let headers = strings(&INVOICE_HEADERS);
    let first = engine.map_columns(&headers, &[], &LearnedMappings::new(), &FieldKey::ALL);
    let second = engine.map_columns(&headers, &[], &LearnedMappings::new(), &FieldKey::ALL);
    assert_eq!(first, second);
}

#[test]
fn every_label_maps_to_its_own_field() {
    let engine = MappingEngine::default();
    let table = KeywordTable::default();
    let mut fields = FieldKey::ALL.to_vec();
    for _ in 0..2 {
        let headers: Vec<String> = fields
            .iter()
            .map(|f| table.label(*f).unwrap().to_string())
            .collect();
        let result = engine.map_columns(&headers, &[], &LearnedMappings::new(), &FieldKey::ALL);
        assert_eq!(result.len(), fields.len());
        for (index, field) in fields.iter().enumerate() {
            let column = column_index_to_letter(index);
            assert_eq!(result.field_for(&column), Some(*field), "header \"{}\"", headers[index]);
        }
        fields.reverse();
    }
}

#[test]
fn english_template_maps_by_keywords() {
    let engine = MappingEngine::default();
    let headers = strings(&[
        "Invoice No",
        "Invoice Date",
        "Due Date",
        "Vendor",
        "Vendor VAT ID",
        "Customer",
        "Net",
        "VAT",
        "Total",
        "Currency",
    ]);
    let result = engine.map_columns(&headers, &[], &LearnedMappings::new(), &FieldKey::ALL);

    let expected = [
        FieldKey::InvoiceNumber,
        FieldKey::Date,
        FieldKey::DueDate,
        FieldKey::SellerName,
        FieldKey::SellerTaxId,
        FieldKey::BuyerName,
        FieldKey::NetAmount,
        FieldKey::TaxAmount,
        FieldKey::TotalAmount,
        FieldKey::Currency,
    ];
    assert_eq!(result.len(), expected.len());
    for (index, field) in expected.into_iter().enumerate() {
        let column = column_index_to_letter(index);
        assert_eq!(result.field_for(&column), Some(field), "header \"{}\"", headers[index]);
    }
}

#[test]
fn bare_due_date_header_is_not_taken_by_date() {
    let engine = MappingEngine::default();
    let result = engine.map_columns(&strings(&["Due Date"]), &[], &LearnedMappings::new(), &FieldKey::ALL);
    assert_eq!(result.field_for("A"), Some(FieldKey::DueDate));

    let result = engine.map_columns(&strings(&["Date", "Due Date"]), &[], &LearnedMappings::new(), &FieldKey::ALL);
    assert_eq!(result.field_for("A"), Some(FieldKey::Date));
    assert_eq!(result.field_for("B"), Some(FieldKey::DueDate));
}

#[test]
fn learned_mapping_is_kept() {
    let engine = MappingEngine::default();
    let headers = strings(&["Број на документ", "Дата", "Вкупно"]);
    let mut learned = LearnedMappings::new();
    learned.insert(
        FieldKey::InvoiceNumber,
        LearnedMapping {
            column_letter: "A".into(),
            confidence: 0.9,
        },
    );
    let result = engine.map_columns(&headers, &[], &learned, &FieldKey::ALL);
    assert_eq!(result.field_for("A"), Some(FieldKey::InvoiceNumber));
    assert_eq!(result.field_for("B"), Some(FieldKey::Date));
    assert_eq!(result.field_for("C"), Some(FieldKey::TotalAmount));
    assert!(result.evidence["A"].iter().any(|e| e == "learned from user correction"));
}

#[test]
fn learned_correction_beats_keyword_guess() {
    let engine = MappingEngine::default();
    let headers = strings(&["Број на документ", "Интерна ознака"]);
    let mut learned = LearnedMappings::new();
    learned.insert(
        FieldKey::InvoiceNumber,
        LearnedMapping {
            column_letter: "B".into(),
            confidence: 0.95,
        },
    );
    let result = engine.map_columns(&headers, &[], &learned, &FieldKey::ALL);
    assert_eq!(result.field_for("B"), Some(FieldKey::InvoiceNumber));
    assert_eq!(result.field_for("A"), None);
    assert_eq!(result.confidence_of("B"), Some(0.98));
}

#[test]
fn stale_learned_column_is_ignored() {
    let engine = MappingEngine::default();
    let headers = strings(&["Дата"]);
    let mut learned = LearnedMappings::new();
    learned.insert(
        FieldKey::TotalAmount,
        LearnedMapping {
            column_letter: "K".into(),
            confidence: 0.95,
        },
    );
    let result = engine.map_columns(&headers, &[], &learned, &FieldKey::ALL);
    assert_eq!(result.len(), 1);
    assert_eq!(result.field_for("A"), Some(FieldKey::Date));
}

#[test]
fn document_type_header_hits_keyword() {
    let config = MappingConfig::default();
    let strategy = KeywordStrategy::new(&KeywordTable::default(), &config);
    let headers = strings(&["Тип на документ"]);
    let learned = LearnedMappings::new();
    let results = strategy.evaluate(&MatchInput {
        headers: &headers,
        samples: &[],
        learned: &learned,
        fields: &FieldKey::ALL,
    });
    let hit = results
        .iter()
        .find(|r| r.field == FieldKey::DocumentType)
        .expect("document_type vote");
    assert_eq!(hit.strategy, StrategyId::KeywordMatching);
    assert!(hit.confidence >= 0.85);
}

#[test]
fn iso_date_samples_vote_for_date() {
    let config = MappingConfig::default();
    let strategy = PatternStrategy::new(PatternLibrary::default(), &config);
    let headers = strings(&["?"]);
    let samples = vec![strings(&["2025-01-22", "2025-06-19", "2025-10-07"])];
    let learned = LearnedMappings::new();
    let results = strategy.evaluate(&MatchInput {
        headers: &headers,
        samples: &samples,
        learned: &learned,
        fields: &FieldKey::ALL,
    });
    let date = results.iter().find(|r| r.field == FieldKey::Date).expect("date vote");
    assert!(date.confidence >= 0.54 - 1e-9);
    assert!(date.evidence.contains("3 sample"));
}

#[test]
fn samples_decide_when_headers_say_nothing() {
    let engine = MappingEngine::default();
    let headers = strings(&["Колона 1", "Колона 2", "Колона 3"]);
    let samples = vec![
        strings(&["22.01.2025", "19.06.2025"]),
        strings(&["MKD", "MKD", "EUR", "MKD", "MKD"]),
        strings(&["МК4030995123456", "МК4030995123457", "4030995123458", "4030995123459", "4030995123450"]),
    ];
    let result = engine.map_columns(&headers, &samples, &LearnedMappings::new(), &FieldKey::ALL);
    assert_eq!(result.field_for("A"), Some(FieldKey::Date));
    assert_eq!(result.field_for("B"), Some(FieldKey::Currency));
    assert_eq!(result.field_for("C"), Some(FieldKey::SellerTaxId));
}

#[test]
fn fingerprint_ignores_column_order() {
    let mut shuffled = strings(&INVOICE_HEADERS);
    shuffled.reverse();
    shuffled.swap(0, 4);
    assert_eq!(fingerprint(&INVOICE_HEADERS), fingerprint(&shuffled));
    assert_ne!(fingerprint(&INVOICE_HEADERS), fingerprint(&INVOICE_HEADERS[..8]));
}
