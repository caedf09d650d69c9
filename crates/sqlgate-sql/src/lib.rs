//! # sqlgate-sql
//!
//! Everything sqlgate knows about SQL text:
//!
//! - [`tree`]: the typed statement tree the rest of the gateway consumes
//! - [`parser`]: the parser boundary and its PostgreSQL-dialect default
//! - [`policy`]: the `;`/`--` pre-check, forbidden relations and classification
//! - [`extractor`]: recursive relation extraction
//!
//! ```
//! use sqlgate_sql::{PostgresParser, RelationExtractor, SqlParser, classify, Operation};
//!
//! let tree = PostgresParser::new().parse("SELECT * FROM public.parcels").unwrap();
//! assert_eq!(classify(&tree).unwrap(), Operation::Read);
//! let relations = RelationExtractor::default().extract(&tree).unwrap();
//! assert_eq!(relations.names(), vec!["public.parcels"]);
//! ```

pub mod error;
pub mod extractor;
pub mod parser;
pub mod policy;
pub mod tree;

pub use error::{RejectionKind, SqlError};
pub use extractor::{ExprType, RelationExtractor, RelationRef, RelationSet};
pub use parser::{PostgresParser, SqlParser};
pub use policy::{ForbiddenRelations, Operation, Role, classify, precheck};
pub use tree::{Section, StatementTree};
