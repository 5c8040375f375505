//! Table-driven conversion between namelists and definition records.

use super::lexer::{Namelist, header_value};
use crate::error::{Result, SddsError};
use crate::layout::{Definition, FieldValue};

/// Build a `D` from a parsed namelist, checking every field against
/// `D::FIELDS`.
pub fn apply<D: Definition>(namelist: &Namelist) -> Result<D> {
    let mut def = D::blank();
    let mut seen: Vec<&str> = Vec::with_capacity(namelist.fields.len());
    for (key, raw) in &namelist.fields {
        let spec = D::field_spec(key).ok_or_else(|| {
            SddsError::parse(format!("&{} does not accept the field \"{key}\"", D::KIND))
        })?;
        def.set_field(spec.name, FieldValue::parse(spec, raw)?)?;
        seen.push(spec.name);
    }
    if let Some(missing) = D::FIELDS
        .iter()
        .find(|spec| spec.required && !seen.contains(&spec.name))
    {
        return Err(SddsError::parse(format!(
            "&{} is missing the required field {}",
            D::KIND,
            missing.name
        )));
    }
    Ok(def)
}

/// Canonical one-line namelist for `def`: fields in table order, unset
/// text and default integers left out.
#[must_use]
pub fn render<D: Definition>(def: &D) -> String {
    let mut line = format!("&{} ", D::KIND);
    for spec in D::FIELDS.iter().filter(|s| s.written) {
        let text = match def.field(spec.name) {
            Some(FieldValue::Text(Some(t))) => header_value(&t),
            Some(FieldValue::Int(i)) if spec.required || i != spec.default => i.to_string(),
            Some(FieldValue::Type(t)) => t.name().to_string(),
            _ => continue,
        };
        line.push_str(spec.name);
        line.push('=');
        line.push_str(&text);
        line.push_str(", ");
    }
    line.push_str("&end\n");
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::lexer::parse_namelist;
    use crate::layout::{ColumnDefinition, DataMode};
    use crate::types::SddsType;

    #[test]
    fn render_then_apply_keeps_fields() {
        let col = ColumnDefinition::new("x", SddsType::Float)
            .units("m m")
            .description("");
        let line = render(&col);
        assert_eq!(line, "&column name=x, units=\"m m\", description=\"\", type=float, &end\n");
        let back: ColumnDefinition = apply(&parse_namelist(&line).unwrap()).unwrap();
        assert_eq!(back, col);
    }

    #[test]
    fn data_mode_omits_defaults() {
        let mode = DataMode {
            column_major: true,
            ..DataMode::default()
        };
        assert_eq!(render(&mode), "&data mode=binary, column_major_order=1, &end\n");
    }

    #[test]
    fn unknown_and_missing_fields_are_parse_errors() {
        let nl = parse_namelist("&column name=x, type=double, colour=red &end").unwrap();
        assert!(apply::<ColumnDefinition>(&nl).is_err());
        let nl = parse_namelist("&column name=x &end").unwrap();
        assert!(apply::<ColumnDefinition>(&nl).is_err());
    }
}
