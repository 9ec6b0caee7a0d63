//! Parsing transfer expressions returned by the guest

use jlbridge::expr::{parse, unescape, Expr, ExprError};
use jlbridge::{
    Column, HostDecoder, Limits, Matrix, StageError, StagedFile, StagedReloader, StagingConfig, Table,
    TransferError, TypedArray, Value,
};

fn parse_ok(src: &str) -> Expr {
    parse(src, &Limits::default()).expect("parse")
}

fn value_of(src: &str) -> Value {
    let limits = Limits::default();
    let staging = StagingConfig::default();
    HostDecoder::new(&limits, &staging)
        .parse_expression("x", src)
        .expect("decode")
}

// ============================================================================
// Grammar
// ============================================================================

#[test]
fn scalars() {
    assert_eq!(parse_ok("null"), Expr::Null);
    assert_eq!(parse_ok("true"), Expr::Bool(true));
    assert_eq!(parse_ok("-42"), Expr::Int(-42));
    assert_eq!(parse_ok("2.5"), Expr::Float(2.5));
    assert_eq!(parse_ok("f64(3)"), Expr::Float(3.0));
    assert_eq!(parse_ok("complex(1, -inf)"), Expr::Complex(1.0, f64::NEG_INFINITY));
    assert_eq!(parse_ok(r#""a\tb""#), Expr::Str("a\tb".to_string()));

    let Expr::Float(nan) = parse_ok("f64(nan)") else {
        panic!("expected a float");
    };
    assert!(nan.is_nan());
}

#[test]
fn containers() {
    assert_eq!(
        value_of(r#"[1, "a", null, [true]]"#),
        Value::Sequence(vec![
            Value::Int(1),
            Value::text("a"),
            Value::Null,
            Value::Sequence(vec![Value::Bool(true)]),
        ])
    );
    assert_eq!(
        value_of(r#"{"b": 1, "a": {"c": []}}"#),
        Value::Mapping(vec![
            ("b".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Mapping(vec![("c".to_string(), Value::Sequence(vec![]))])),
        ])
    );
    assert_eq!(
        value_of(r#"set([1, "x"])"#),
        Value::Set(vec![Value::Int(1), Value::text("x")])
    );
}

#[test]
fn typed_arrays() {
    assert_eq!(
        value_of("array(int64, [1, 2, 3])"),
        Value::Array(TypedArray::Int(vec![1, 2, 3]))
    );
    assert_eq!(
        value_of("array(float64, [1, 0.5, inf])"),
        Value::Array(TypedArray::Float(vec![1.0, 0.5, f64::INFINITY]))
    );
    assert_eq!(
        value_of("array(bool, [true, false,])"),
        Value::Array(TypedArray::Bool(vec![true, false]))
    );
    assert_eq!(value_of("array(int64, [])"), Value::Array(TypedArray::Int(vec![])));
}

#[test]
fn named_and_unrepresentable() {
    let Value::NamedVector(named) = value_of(r#"named([1, 2], ["a", "b"])"#) else {
        panic!("expected a named vector");
    };
    assert_eq!(named.labels(), &["a".to_string(), "b".to_string()]);
    assert_eq!(named.get("a"), Some(&Value::Int(1)));

    assert_eq!(
        value_of(r#"unrepresentable("Module", "Main")"#),
        Value::unrepresentable("Module", "Main")
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn errors_carry_offsets() {
    let limits = Limits::default();
    assert!(matches!(
        parse("[1, 2", &limits),
        Err(ExprError::UnexpectedEof { offset: 5, .. })
    ));
    assert!(matches!(
        parse("[1 2]", &limits),
        Err(ExprError::UnexpectedToken { offset: 3, .. })
    ));
    assert!(matches!(
        parse("1 2", &limits),
        Err(ExprError::TrailingInput { offset: 2 })
    ));
    assert!(matches!(
        parse("eval(1)", &limits),
        Err(ExprError::UnknownForm { offset: 0, .. })
    ));
    assert!(matches!(
        parse("array(int8, [1])", &limits),
        Err(ExprError::UnknownDtype { offset: 6, .. })
    ));
    assert!(matches!(
        parse("[1; 2]", &limits),
        Err(ExprError::UnexpectedChar { ch: ';', offset: 2 })
    ));
    assert!(matches!(
        parse("array(int64, [1.5])", &limits),
        Err(ExprError::UnexpectedToken { .. })
    ));
}

#[test]
fn nesting_limit() {
    let limits = Limits {
        max_depth: 3,
        ..Limits::default()
    };
    assert!(parse("[[[1]]]", &limits).is_ok());
    assert!(matches!(
        parse("[[[[1]]]]", &limits),
        Err(ExprError::DepthExceeded { max: 3, offset: 4 })
    ));
    assert!(matches!(
        parse(r#"{"a": {"b": {"c": {"d": 1}}}}"#, &limits),
        Err(ExprError::DepthExceeded { .. })
    ));
}

#[test]
fn length_limit() {
    let limits = Limits {
        max_expression_len: 8,
        ..Limits::default()
    };
    assert!(matches!(
        parse("[1, 2, 3, 4]", &limits),
        Err(ExprError::TooLong { len: 12, max: 8 })
    ));
}

#[test]
fn quoted_results_unescape() {
    assert_eq!(unescape(r#""[1, \"a\"]""#).expect("unescape"), r#"[1, "a"]"#);
    assert_eq!(unescape(r#""é\U0001F600""#).expect("unescape"), "é😀");
    assert!(matches!(
        unescape(r#""a" junk"#),
        Err(ExprError::TrailingInput { offset: 3 })
    ));
    assert!(unescape("[1]").is_err());
}

#[test]
fn decode_failures_name_the_variable() {
    let limits = Limits::default();
    let staging = StagingConfig::default();
    let error = HostDecoder::new(&limits, &staging)
        .parse_expression("df", "table(")
        .expect_err("bad expression");
    let TransferError::DecodeFailure { name, expression, .. } = error else {
        panic!("expected a decode failure, got {:?}", error);
    };
    assert_eq!(name, "df");
    assert_eq!(expression, "table(");
}

// ============================================================================
// Staged files
// ============================================================================

/// Host staging settings that share `dir` with the guest.
fn staging_in(dir: &std::path::Path) -> StagingConfig {
    StagingConfig {
        dir: Some(dir.to_path_buf()),
        ..StagingConfig::default()
    }
}

/// Write `table` the way the guest does (`tempname() * ".feather"`).
fn guest_file(dir: &std::path::Path, table: &Table) -> String {
    let staging = StagingConfig {
        prefix: "jl_".to_string(),
        ..staging_in(dir)
    };
    let file = StagedFile::create(&staging).expect("create");
    file.write_table(table).expect("write");
    file.keep().to_string_lossy().into_owned()
}

#[test]
fn staged_table_is_read_once_and_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = Table::try_from_columns(vec![
        ("a".to_string(), Column::Int(vec![Some(1), None])),
        ("b".to_string(), Column::Bool(vec![Some(true), Some(false)])),
    ])
    .expect("table");
    let path = guest_file(dir.path(), &table);

    let staging = staging_in(dir.path());
    let mut reloader = StagedReloader::new(&staging);
    let expr = parse_ok(&format!("{{\"t\": table({:?})}}", path));
    assert_eq!(expr.staged_paths(), vec![path.as_str()]);

    let value = expr.materialize(&mut reloader).expect("materialize");
    assert_eq!(value.get("t"), Some(&Value::Table(table)));
    assert_eq!(reloader.reads(), 1);
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn staged_matrix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let matrix = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("matrix");
    let path = guest_file(dir.path(), &matrix.to_table());

    let limits = Limits::default();
    let staging = staging_in(dir.path());
    let value = HostDecoder::new(&limits, &staging)
        .parse_expression("m", &format!("matrix({:?})", path))
        .expect("decode");
    assert_eq!(value, Value::Matrix(matrix));
}

#[test]
fn foreign_paths_are_refused() {
    let staging = StagingConfig::default();
    let mut reloader = StagedReloader::new(&staging);
    let result = parse_ok(r#"table("/etc/passwd")"#).materialize(&mut reloader);
    assert!(matches!(result, Err(StageError::Rejected(_))));
    assert_eq!(reloader.reads(), 0);
}

#[test]
fn user_feather_files_survive_decoding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = Table::try_from_columns(vec![("a".to_string(), Column::Float(vec![Some(1.5)]))]).expect("table");
    let staged = guest_file(dir.path(), &table);
    let user_file = dir.path().join("mydata.feather");
    std::fs::rename(&staged, &user_file).expect("rename");
    let expression = format!("table({:?})", user_file.to_string_lossy());

    let limits = Limits::default();
    let staging = staging_in(dir.path());
    let decoder = HostDecoder::new(&limits, &staging);
    assert!(matches!(
        decoder.parse_expression("t", &expression),
        Err(TransferError::DecodeFailure { .. })
    ));
    assert!(user_file.exists());

    assert_eq!(
        decoder.inspect_expression("t", &expression).expect("inspect"),
        Value::Table(table)
    );
    assert!(user_file.exists());
}
