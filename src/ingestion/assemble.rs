use crate::error::{IngestError, IngestResult};
use crate::types::{
    ColumnSchema, DataVariable, IngestMetadata, UNF_NOT_CALCULATED, VAR_QUANTITY,
};

use super::tally::CategoryTally;

/// Check the pass counts and build the metadata of the ingested table.
///
/// `case_count` is the number of records the first pass wrote; `line_count` the number of lines
/// the second pass read back.
pub fn assemble_metadata(
    case_count: u64,
    line_count: u64,
    tally: CategoryTally,
) -> IngestResult<IngestMetadata> {
    if case_count != line_count {
        return Err(IngestError::RowCountMismatch {
            first_pass: case_count,
            second_pass: line_count,
        });
    }

    let variables = ColumnSchema
        .fields()
        .iter()
        .zip(tally.into_categories())
        .enumerate()
        .map(|(file_order, (field, categories))| DataVariable {
            name: field.name.to_string(),
            label: field.name.to_string(),
            file_order,
            var_type: field.var_type,
            interval: field.var_type.interval(),
            categories,
            unf: UNF_NOT_CALCULATED.to_string(),
        })
        .collect();

    Ok(IngestMetadata {
        var_quantity: VAR_QUANTITY,
        case_quantity: case_count,
        unf: UNF_NOT_CALCULATED.to_string(),
        variables,
    })
}
