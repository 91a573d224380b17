use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Factory, Value};

pub const INVALID_XPATH: &str = "(invalid xpath)";
pub const INVALID_XML: &str = "(invalid xml)";
pub const NOT_FOUND: &str = "(xpath not found)";

pub fn evaluate(body: &str, response: &[u8]) -> String {
    if Factory::new().build(body).is_err() {
        debug!("Invalid xpath `{}`", body);
        return INVALID_XPATH.to_string();
    }

    let Ok(text) = std::str::from_utf8(response) else {
        debug!("Response is not valid utf-8");
        return INVALID_XML.to_string();
    };
    let package = match parser::parse(text) {
        Ok(package) => package,
        Err(e) => {
            debug!("Response is not valid xml: {:?}", e);
            return INVALID_XML.to_string();
        }
    };
    let document = package.as_document();

    match evaluate_xpath(&document, body) {
        Ok(Value::Nodeset(nodes)) => match nodes.document_order_first() {
            Some(node) => node.string_value(),
            None => NOT_FOUND.to_string(),
        },
        Ok(value) => value.string(),
        Err(e) => {
            debug!("Failed to evaluate xpath `{}`: {:?}", body, e);
            NOT_FOUND.to_string()
        }
    }
}
