use indoc::indoc;
use xml_example::rest::{self, GetTopError, GetTreeError, NotFound, Throttled};
use xml_example::query;
use xml_wire::{BuildError, DecodeError};

fn top_err(doc: &[u8]) -> DecodeError {
    rest::parse_get_top_output(doc).unwrap_err()
}

#[test]
fn required_members_must_be_present() {
    let err = top_err(b"<Top><Field>x</Field></Top>");
    assert!(
        matches!(err, DecodeError::Build(BuildError::MissingMember { shape: "Top", member: "id" })),
        "{err}"
    );

    let err = top_err(br#"<Top id="1"><choice><nested label="n"/></choice></Top>"#);
    assert_eq!(err.to_string(), "Nested: required member `value` was never set");
}

#[test]
fn primitive_failures() {
    let err = top_err(br#"<Top id="1"><extra>lots</extra></Top>"#);
    assert!(matches!(err, DecodeError::Primitive { kind: "long", ref text } if text == "lots"), "{err}");

    let err = top_err(br#"<Top id="1" version="three"/>"#);
    assert!(matches!(err, DecodeError::Primitive { kind: "integer", .. }), "{err}");

    let err = top_err(br#"<Top id="1"><enabled>yes</enabled></Top>"#);
    assert!(matches!(err, DecodeError::Primitive { kind: "boolean", .. }), "{err}");

    let err = top_err(br#"<Top id="1"><payload>!!not base64!!</payload></Top>"#);
    assert!(matches!(err, DecodeError::Primitive { kind: "blob", .. }), "{err}");

    let err = top_err(br#"<Top id="1"><created>last tuesday</created></Top>"#);
    assert!(matches!(err, DecodeError::Primitive { kind: "timestamp", .. }), "{err}");
}

#[test]
fn malformed_documents() {
    let err = top_err(br#"<Top id="1"><Field>x</Field>"#);
    assert!(matches!(err, DecodeError::Unterminated(_) | DecodeError::Xml(_)), "{err}");

    let err = top_err(br#"<Top id="1"><Field>x</Top>"#);
    assert!(matches!(err, DecodeError::Xml(_)), "{err}");

    let err = top_err(b"<Top id=\"1\">\xff</Top>");
    assert!(matches!(err, DecodeError::Utf8(_)), "{err}");

    let err = top_err(b"");
    assert!(matches!(err, DecodeError::NoRoot), "{err}");
}

#[test]
fn root_must_be_the_output_shape() {
    let err = top_err(b"<Other/>");
    assert_eq!(err.to_string(), "expected <Top>, got <Other>");
}

#[test]
fn incomplete_map_entries() {
    let err = top_err(br#"<Top id="1"><counts><entry><Name>Foo</Name></entry></counts></Top>"#);
    assert!(
        matches!(err, DecodeError::IncompleteEntry { ref entry, missing: "Count" } if entry == "entry"),
        "{err}"
    );

    let err = top_err(br#"<Top id="1"><choice_entry><value><text>v</text></value></choice_entry></Top>"#);
    assert!(
        matches!(err, DecodeError::IncompleteEntry { ref entry, missing: "key" } if entry == "choice_entry"),
        "{err}"
    );
}

#[test]
fn bare_error_documents() {
    let doc = indoc! {r#"
        <Error>
            <Code>NotFound</Code>
            <Message>no such top</Message>
            <Resource>top-9</Resource>
            <RequestId>r1</RequestId>
        </Error>
    "#};
    let err = rest::parse_get_top_error(doc.as_bytes()).unwrap();
    let expected = NotFound {
        message: Some("no such top".to_owned()),
        resource: Some("top-9".to_owned()),
    };
    assert_eq!(err.to_string(), "NotFound: no such top");
    assert!(matches!(err, GetTopError::NotFound(ref e) if *e == expected));

    let doc = br#"<Error><Code>ThrottlingException</Code><RetryAfterSeconds>30</RetryAfterSeconds></Error>"#;
    let err = rest::parse_get_top_error(doc).unwrap();
    assert!(matches!(err, GetTopError::Throttled(Throttled { retry_after: Some(30) })), "{err}");

    let err = rest::parse_get_tree_error(doc).unwrap();
    assert!(matches!(err, GetTreeError::Unhandled(ref meta) if meta.code() == Some("ThrottlingException")));
}

#[test]
fn unmodeled_error_codes() {
    let doc = br#"<Error><Code>InternalFailure</Code><Message>oops</Message><RequestId>r1</RequestId></Error>"#;
    let err = rest::parse_get_top_error(doc).unwrap();
    let GetTopError::Unhandled(meta) = &err else {
        panic!("expected an unhandled error, got {err:?}");
    };
    assert_eq!(meta.code(), Some("InternalFailure"));
    assert_eq!(meta.message(), Some("oops"));
    assert_eq!(meta.request_id(), Some("r1"));
    assert_eq!(err.to_string(), "InternalFailure: oops (request id r1)");
}

#[test]
fn wrapped_error_documents() {
    let doc = indoc! {r#"
        <ErrorResponse>
            <Error>
                <Type>Sender</Type>
                <Code>NotFound</Code>
                <Message>gone</Message>
            </Error>
            <RequestId>r2</RequestId>
        </ErrorResponse>
    "#};
    let err = query::parse_get_tree_error(doc.as_bytes()).unwrap();
    let query::GetTreeError::NotFound(not_found) = err else {
        panic!("expected NotFound");
    };
    assert_eq!(not_found.message.as_deref(), Some("gone"));
    assert_eq!(not_found.resource, None);

    let err = query::parse_get_top_error(b"<Oops/>").unwrap_err();
    assert!(matches!(err, DecodeError::UnexpectedElement { .. }), "{err}");
}

fn chain_doc(links: usize) -> String {
    format!(
        r#"<Top id="d"><chain>{}{}</chain></Top>"#,
        "<next>".repeat(links),
        "</next>".repeat(links)
    )
}

#[test]
fn deep_nesting_is_an_error() {
    // <Top> and <chain> take the first two levels
    let fits = xml_wire::MAX_DEPTH - 2;
    let top = rest::parse_get_top_output(chain_doc(fits).as_bytes()).unwrap();
    let mut links = 0;
    let mut chain = top.chain.as_ref();
    while let Some(next) = chain.and_then(|c| c.next.as_deref()) {
        links += 1;
        chain = Some(next);
    }
    assert_eq!(links, fits);

    let err = top_err(chain_doc(fits + 1).as_bytes());
    assert!(matches!(err, DecodeError::TooDeep(depth) if depth == xml_wire::MAX_DEPTH), "{err}");

    let err = top_err(chain_doc(30_000).as_bytes());
    assert!(matches!(err, DecodeError::TooDeep(_)), "{err}");
}

#[test]
fn error_envelope_must_match_the_protocol() {
    let wrapped = br#"<ErrorResponse><Error><Code>NotFound</Code></Error></ErrorResponse>"#;
    let bare = br#"<Error><Code>NotFound</Code></Error>"#;
    let bare_unmodeled = br#"<Error><Code>Other</Code></Error>"#;
    let wrapped_unmodeled = br#"<ErrorResponse><Error><Code>Other</Code></Error></ErrorResponse>"#;

    for doc in [&wrapped[..], &wrapped_unmodeled[..]] {
        let err = rest::parse_get_top_error(doc).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedElement { .. }), "{err}");
        assert!(query::parse_get_top_error(doc).is_ok());
    }
    for doc in [&bare[..], &bare_unmodeled[..]] {
        let err = query::parse_get_top_error(doc).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedElement { .. }), "{err}");
        assert!(rest::parse_get_top_error(doc).is_ok());
    }

    let err = query::parse_get_top_error(b"<ErrorResponse><RequestId>r</RequestId></ErrorResponse>").unwrap_err();
    assert!(matches!(err, DecodeError::MissingElement(_)), "{err}");
}
