use super::*;

#[test]
fn test_read_nested_list() {
    let cell = read("(+ (* 2 100) (* 1 10))").unwrap();
    assert_eq!(cell.to_string(), "(+ (* 2 100) (* 1 10))");
    assert_eq!(cell.len(), 3);
}

#[test]
fn test_read_atoms() {
    assert_eq!(read("42").unwrap(), Cell::number(42));
    assert_eq!(read("-7").unwrap(), Cell::number(-7));
    assert!(matches!(read("-").unwrap(), Cell::Symbol(_)));
    assert!(matches!(read("1abc").unwrap(), Cell::Symbol(_)));
    assert!(matches!(read("set!").unwrap(), Cell::Symbol(_)));
}

#[test]
fn test_read_string_with_escapes() {
    let cell = read(r#""say \"hi\"""#).unwrap();
    let Cell::Str(text) = cell else {
        unreachable!("expected string, got {:?}", cell)
    };
    assert_eq!(&*text, "say \"hi\"");
    assert_eq!(read(r#""""#).unwrap().to_string(), "");
}

#[test]
fn test_comments_are_skipped() {
    let forms = read_program("; leading\n(define x 1) ; trailing\n;; more\nx").unwrap();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[1].to_string(), "x");
}

#[test]
fn test_read_returns_first_form() {
    let cell = read("(a) (b)").unwrap();
    assert_eq!(cell.to_string(), "(a)");
}

#[test]
fn test_unbalanced_parens() {
    assert!(matches!(read("(+ 1 2"), Err(ReadError::UnbalancedParens(_))));
    assert!(matches!(read("(+ 1 2))"), Err(ReadError::UnbalancedParens(_))));
    // parens inside strings and comments do not count
    assert!(read("(print \")(\") ; (").is_ok());
}

#[test]
fn test_empty_input() {
    assert_eq!(read("   ; nothing\n"), Err(ReadError::Empty));
    assert_eq!(read_program("").unwrap().len(), 0);
}

#[test]
fn test_number_out_of_range() {
    assert!(matches!(
        read("99999999999999999999"),
        Err(ReadError::NumberOutOfRange(_))
    ));
}
