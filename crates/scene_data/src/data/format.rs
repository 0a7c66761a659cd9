//! Property name formatting
//!
//! Array providers store their properties under native names (`priority`). In
//! a container, the provider holding slot `2` of the `material` array exposes
//! them as `material[2].priority`. Consumers that do not know slot indices
//! write templates such as `material[${materialId}].priority` and substitute
//! the variables themselves.

use std::collections::HashMap;

const LENGTH_SUFFIX: &str = ".length";

/// Container-scoped name of a provider property
///
/// Plain providers (`array_name == None`) use their native names unchanged.
pub fn format_property_name(array_name: Option<&str>, index: Option<usize>, native: &str) -> String {
    match (array_name, index) {
        (Some(array), Some(index)) => format!("{array}[{index}].{native}"),
        _ => native.to_owned(),
    }
}

/// Native name behind a formatted name, or `None` if `formatted` does not
/// belong to the given array slot
pub fn unformat_property_name<'a>(
    array_name: Option<&str>,
    index: Option<usize>,
    formatted: &'a str,
) -> Option<&'a str> {
    match (array_name, index) {
        (Some(array), Some(index)) => formatted
            .strip_prefix(array)
            .and_then(|rest| rest.strip_prefix('['))
            .and_then(|rest| rest.strip_prefix(index.to_string().as_str()))
            .and_then(|rest| rest.strip_prefix("]."))
            .filter(|native| !native.is_empty()),
        _ => Some(formatted),
    }
}

/// Name of the synthetic element-count property of an array
pub fn length_property_name(array_name: &str) -> String {
    format!("{array_name}{LENGTH_SUFFIX}")
}

/// Array name behind a length property name such as `material.length`
pub fn length_property_array(name: &str) -> Option<&str> {
    name.strip_suffix(LENGTH_SUFFIX).filter(|array| !array.is_empty())
}

/// Replace every `${variable}` in `template` with its value
///
/// Unknown variables and unterminated placeholders are left untouched.
pub fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let variable = &after[..end];
                match variables.get(variable) {
                    Some(value) => result.push_str(value),
                    None => result.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}
