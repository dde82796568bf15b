//! Chado fixtures for the test GPAD files

use gpad_chado::{ChadoStore, OpenStore};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;

/// Genes annotated by `test.gpad` and `test_updated.gpad`
pub const GENES: &[&str] = &[
    "DDB_G0272003",
    "DDB_G0272004",
    "DDB_G0267376",
    "DDB_G0268956",
    "DDB_G0269114",
    "DDB_G0280897",
    "DDB_G0277409",
    "DDB_G0287859",
    "DDB_G0288397",
];

/// (cv, accession, name) of the GO terms the files use
pub const GO_TERMS: &[(&str, &str, &str)] = &[
    ("molecular_function", "0000015", "phosphopyruvate hydratase complex"),
    ("molecular_function", "0003677", "DNA binding"),
    ("molecular_function", "0003700", "DNA-binding transcription factor activity"),
    ("cellular_component", "0005634", "nucleus"),
    ("cellular_component", "0005737", "cytoplasm"),
    ("biological_process", "0006355", "regulation of DNA-templated transcription"),
    ("biological_process", "0006915", "apoptotic process"),
    ("biological_process", "0000278", "mitotic cell cycle"),
];

const ECO_TERMS: &[(&str, &str)] = &[
    ("0000256", "match to sequence model evidence used in automatic assertion"),
    ("0000318", "biological aspect of ancestor evidence used in manual assertion"),
    ("0000314", "direct assay evidence used in manual assertion"),
    ("0000250", "sequence similarity evidence used in manual assertion"),
];

const PUBS: &[(&str, &str)] = &[
    ("21515711", "PubMed"),
    ("12345678", "PubMed"),
    ("0000002", "GO_REF"),
    ("0000024", "GO_REF"),
    ("0000033", "GO_REF"),
];

/// Path of a file under `tests/data`
pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

fn add_term(conn: &Connection, cv: &str, db: &str, accession: &str, name: &str) -> rusqlite::Result<i64> {
    conn.execute("INSERT OR IGNORE INTO cv (name) VALUES (?1)", params![cv])?;
    conn.execute("INSERT OR IGNORE INTO db (name) VALUES (?1)", params![db])?;
    conn.execute(
        "INSERT INTO dbxref (db_id, accession) VALUES ((SELECT db_id FROM db WHERE name = ?1), ?2)",
        params![db, accession],
    )?;
    let dbxref_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO cvterm (cv_id, name, dbxref_id) VALUES ((SELECT cv_id FROM cv WHERE name = ?1), ?2, ?3)",
        params![cv, name, dbxref_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Seed organism, genes, publications, GO and ECO terms
pub fn seed_fixtures(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO organism (genus, species, common_name) VALUES ('Dictyostelium', 'discoideum', 'dicty')",
        [],
    )?;
    let organism_id = conn.last_insert_rowid();
    let gene_type = add_term(conn, "sequence", "SO", "0000704", "gene")?;
    let pub_type = add_term(conn, "pub", "internal", "pub:journal article", "journal article")?;

    for gene in GENES {
        conn.execute(
            "INSERT INTO feature (organism_id, uniquename, name, type_id) VALUES (?1, ?2, ?2, ?3)",
            params![organism_id, gene, gene_type],
        )?;
    }
    for (uniquename, pubplace) in PUBS {
        conn.execute(
            "INSERT INTO pub (uniquename, pubplace, type_id) VALUES (?1, ?2, ?3)",
            params![uniquename, pubplace, pub_type],
        )?;
    }
    for (cv, accession, name) in GO_TERMS {
        add_term(conn, cv, "GO", accession, name)?;
    }
    for (accession, name) in ECO_TERMS {
        add_term(conn, "eco", "ECO", accession, name)?;
    }
    Ok(())
}

/// In-memory store with the schema deployed and fixtures loaded
pub fn seeded_store() -> Arc<ChadoStore> {
    let store = ChadoStore::open_in_memory().expect("open in-memory store");
    store.with_connection(seed_fixtures).expect("seed fixtures");
    Arc::new(store)
}

/// Row count of a table
pub fn count(store: &ChadoStore, table: &str) -> i64 {
    count_where(store, table, "1 = 1")
}

/// Row count of a table under a WHERE clause
pub fn count_where(store: &ChadoStore, table: &str, clause: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, clause);
    store
        .with_connection(|conn| conn.query_row(&sql, [], |row| row.get(0)))
        .expect("count query")
}
