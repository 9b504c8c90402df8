use std::any::type_name;
use std::rc::Rc;

pub trait FormatValue {
    fn format_value(&self) -> String;
}

impl FormatValue for i32 {
    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl FormatValue for f64 {
    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl FormatValue for bool {
    fn format_value(&self) -> String {
        String::from(if *self { "true" } else { "false" })
    }
}

impl FormatValue for String {
    fn format_value(&self) -> String {
        format!("\"{}\"", self)
    }
}

/// Object handles print their type and address only; the output is for
/// debugging and cannot be parsed back.
impl<T: ?Sized> FormatValue for Rc<T> {
    fn format_value(&self) -> String {
        format!("<{}:{:p}>", type_name::<Rc<T>>(), Rc::as_ptr(self) as *const ())
    }
}

impl<T: FormatValue> FormatValue for Vec<T> {
    fn format_value(&self) -> String {
        let items: Vec<String> = self.iter().map(FormatValue::format_value).collect();
        format!("{{{}}}", items.join(", "))
    }
}
