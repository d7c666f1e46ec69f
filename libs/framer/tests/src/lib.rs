#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use arrow::{
        array::{Array, AsArray},
        datatypes::{Float64Type, Int64Type},
        temporal_conversions::timestamp_ns_to_datetime,
    };
    use sitewise_framer::{
        AssetPropertyValue, AssetPropertyValueHistory, Error, Frame, FrameProducer, FramerConfig,
        PropertyDataType, PropertyKey, PropertyMetadata, PropertyValue, Quality, Resolver,
        Response, StaticResolver, TimeInNanos, Timestamp, Variant,
        append::append_matching_frames,
        cache::{QueryRequest, QueryType, RawTimeRange, RelativeRangeCache, SitewiseQuery, TimeRange},
        output::{OutputFormat, write_frames},
        trim::TimeOrdering,
    };
    use tokio_util::sync::CancellationToken;

    fn init_tracing() {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn pump() -> PropertyMetadata {
        PropertyMetadata {
            asset_id: "a-1".into(),
            asset_name: "Pump-1".into(),
            property_id: "p-1".into(),
            property_name: "Temperature".into(),
            data_type: None,
        }
    }

    fn latest(value: Option<Variant>) -> AssetPropertyValue {
        AssetPropertyValue {
            property: PropertyKey::new("a-1", "p-1"),
            property_value: Some(PropertyValue::new(
                TimeInNanos::from_secs(1_700_000_000),
                value,
            )),
        }
    }

    /// Counts calls and can be told to fail or to hang.
    struct TestResolver {
        metadata: PropertyMetadata,
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    impl TestResolver {
        fn new(metadata: PropertyMetadata) -> Self {
            TestResolver {
                metadata,
                calls: AtomicUsize::new(0),
                fail: false,
                delay: None,
            }
        }
    }

    impl Resolver for TestResolver {
        async fn property(
            &self,
            key: &PropertyKey,
            _cancel: &CancellationToken,
        ) -> Result<PropertyMetadata, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(Error::PropertyNotFound {
                    asset_id: key.asset_id.clone(),
                    property_id: key.property_id.clone(),
                });
            }
            Ok(self.metadata.clone())
        }
    }

    #[tokio::test]
    async fn test_pump_scenario() {
        init_tracing();
        let resolver = TestResolver::new(pump());
        let frames = latest(Some(Variant::Double(42.5)))
            .frames(&resolver, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.name, "Pump-1");
        assert_eq!(frame.column_names(), vec!["time", "Temperature"]);
        assert_eq!(frame.len(), 1);
        let time = timestamp_ns_to_datetime(frame.times().value(0)).unwrap();
        assert_eq!(time.to_string(), "2023-11-14 22:13:20");
        let values = frame
            .column("Temperature")
            .unwrap()
            .as_primitive::<Float64Type>();
        assert_eq!(values.value(0), 42.5);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_value_type_follows_variant() {
        let resolver = TestResolver::new(pump());
        let cancel = CancellationToken::new();
        let cases = [
            (Variant::Double(1.5), arrow::datatypes::DataType::Float64),
            (Variant::Integer(2), arrow::datatypes::DataType::Int64),
            (Variant::String("on".into()), arrow::datatypes::DataType::Utf8),
            (Variant::Boolean(true), arrow::datatypes::DataType::Boolean),
        ];
        for (variant, data_type) in cases {
            let frames = latest(Some(variant)).frames(&resolver, &cancel).await.unwrap();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].len(), 1);
            assert_eq!(frames[0].schema().field(1).data_type(), &data_type);
            assert_eq!(frames[0].null_count("Temperature"), Some(0));
        }
    }

    #[tokio::test]
    async fn test_declared_type_used() {
        let mut metadata = pump();
        metadata.data_type = Some(PropertyDataType::Integer);
        let resolver = TestResolver::new(metadata);
        let frames = latest(None)
            .frames(&resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            frames[0].schema().field(1).data_type(),
            &arrow::datatypes::DataType::Int64
        );
        assert_eq!(frames[0].null_count("Temperature"), Some(1));
    }

    #[tokio::test]
    async fn test_missing_value_is_null() {
        let resolver = TestResolver::new(pump());
        let frames = latest(None)
            .frames(&resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        let column = frames[0].column("Temperature").unwrap();
        assert_eq!(column.len(), 1);
        assert!(column.is_null(0));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let resolver = TestResolver::new(pump());
        let cancel = CancellationToken::new();
        let response = latest(Some(Variant::Integer(9)));
        let a = response.frames(&resolver, &cancel).await.unwrap();
        let b = response.frames(&resolver, &cancel).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_resolver_failure_is_returned_verbatim() {
        let mut resolver = TestResolver::new(pump());
        resolver.fail = true;
        let result = latest(Some(Variant::Double(1.0)))
            .frames(&resolver, &CancellationToken::new())
            .await;
        match result {
            Err(Error::PropertyNotFound {
                asset_id,
                property_id,
            }) => {
                assert_eq!(asset_id, "a-1");
                assert_eq!(property_id, "p-1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    /// Stands in for a remote metadata service that is down.
    struct UnavailableResolver;

    impl Resolver for UnavailableResolver {
        async fn property(
            &self,
            key: &PropertyKey,
            _cancel: &CancellationToken,
        ) -> Result<PropertyMetadata, Error> {
            Err(Error::Resolver(format!(
                "describe {}/{} throttled",
                key.asset_id, key.property_id
            )))
        }
    }

    #[tokio::test]
    async fn test_resolver_service_error_is_returned_verbatim() {
        let err = latest(Some(Variant::Double(1.0)))
            .frames(&UnavailableResolver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_resolution_failure());
        assert!(matches!(&err, Error::Resolver(msg) if msg == "describe a-1/p-1 throttled"));
    }

    #[tokio::test]
    async fn test_cancelled_before_resolve() {
        let resolver = TestResolver::new(pump());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = latest(Some(Variant::Double(1.0)))
            .frames(&resolver, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_resolve() {
        let mut resolver = TestResolver::new(pump());
        resolver.delay = Some(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            latest(Some(Variant::Double(1.0))).frames(&resolver, &cancel),
        )
        .await
        .expect("cancellation did not stop resolution");
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_concurrent_producers_are_independent() {
        let resolver = Arc::new(TestResolver::new(pump()));
        let mut tasks = Vec::new();
        for i in 0..8 {
            let resolver = resolver.clone();
            tasks.push(tokio::spawn(async move {
                latest(Some(Variant::Integer(i)))
                    .frames(resolver.as_ref(), &CancellationToken::new())
                    .await
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            let frames = task.await.unwrap().unwrap();
            let values = frames[0]
                .column("Temperature")
                .unwrap()
                .as_primitive::<Int64Type>();
            assert_eq!(values.value(0), i as i64);
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 8);
    }

    const METADATA: &str = r#"
[[property]]
asset_id = "a-1"
asset_name = "Pump-1"
property_id = "p-1"
property_name = "Temperature"
data_type = "DOUBLE"
"#;

    fn history_page(secs: &[i64], next_token: Option<&str>) -> Response {
        Response::PropertyValueHistory(AssetPropertyValueHistory {
            property: PropertyKey::new("a-1", "p-1"),
            asset_property_value_history: secs
                .iter()
                .map(|s| {
                    PropertyValue::new(TimeInNanos::from_secs(*s), Some(Variant::Double(*s as f64)))
                        .with_quality(Quality::Good)
                })
                .collect(),
            next_token: next_token.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_paginated_history_appends() {
        let resolver = StaticResolver::from(FramerConfig::parse(METADATA).unwrap());
        let cancel = CancellationToken::new();
        let mut frames = Vec::new();
        for page in [history_page(&[1, 2], Some("t1")), history_page(&[3], None)] {
            let page = page.frames(&resolver, &cancel).await.unwrap();
            let page = page.into_iter().map(|f| f.with_ref_id("A")).collect();
            frames = append_matching_frames(frames, page).unwrap();
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 3);
        assert_eq!(frames[0].meta.next_token, None);
        assert_eq!(frames[0].column_names(), vec!["time", "Temperature", "quality"]);
    }

    #[tokio::test]
    async fn test_response_from_json_file_shape() {
        let resolver = StaticResolver::from(FramerConfig::parse(METADATA).unwrap());
        let response: Response = serde_json::from_str(
            r#"{
                "type": "property-aggregate",
                "property": {"assetId": "a-1", "propertyId": "p-1"},
                "aggregatedValues": [
                    {"timestamp": {"timeInSeconds": 60}, "value": {"average": 1.0, "count": 4}},
                    {"timestamp": {"timeInSeconds": 120}, "value": {"average": 2.0, "count": 5}}
                ],
                "nextToken": "abc"
            }"#,
        )
        .unwrap();
        let frames = response
            .frames(&resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(frames[0].column_names(), vec!["time", "avg", "count"]);
        assert_eq!(frames[0].meta.next_token.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_testdata_files() {
        let config = FramerConfig::parse(include_str!("../../testdata/metadata.toml")).unwrap();
        let resolver = StaticResolver::from(config);
        let cancel = CancellationToken::new();

        let latest: Response =
            serde_json::from_str(include_str!("../../testdata/property_value.json")).unwrap();
        let frames = latest.frames(&resolver, &cancel).await.unwrap();
        assert_eq!(frames[0].column_names(), vec!["time", "Temperature"]);

        let mut frames = Vec::new();
        for page in [
            include_str!("../../testdata/history_page_1.json"),
            include_str!("../../testdata/history_page_2.json"),
        ] {
            let page: Response = serde_json::from_str(page).unwrap();
            frames = append_matching_frames(frames, page.frames(&resolver, &cancel).await.unwrap())
                .unwrap();
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 3);
        let running = frames[0].column("Running").unwrap().as_boolean();
        assert!(running.value(0));
        assert!(running.is_null(1));
        assert!(!running.value(2));
    }

    #[tokio::test]
    async fn test_render_testdata_frames() {
        let config = FramerConfig::parse(include_str!("../../testdata/metadata.toml")).unwrap();
        let resolver = StaticResolver::from(config);
        let latest: Response =
            serde_json::from_str(include_str!("../../testdata/property_value.json")).unwrap();
        let frames = latest
            .frames(&resolver, &CancellationToken::new())
            .await
            .unwrap();

        let mut table = Vec::new();
        write_frames(&frames, OutputFormat::Table, &mut table).unwrap();
        let table = String::from_utf8(table).unwrap();
        assert!(table.starts_with("Pump-1 (1 rows)"));
        assert!(table.contains("2023-11-14T22:13:20"));
        assert!(table.contains("42.5"));

        let mut csv = Vec::new();
        write_frames(&frames, OutputFormat::Csv, &mut csv).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("time,Temperature"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2023-11-14T22:13:20"));
        assert!(row.ends_with(",42.5"));
    }

    fn minutes(m: i64) -> Timestamp {
        Timestamp::from_secs(m * 60).unwrap()
    }

    fn request(from: i64, to: i64, targets: Vec<SitewiseQuery>) -> QueryRequest {
        QueryRequest {
            request_id: "r".into(),
            targets,
            range: TimeRange {
                from: minutes(from),
                to: minutes(to),
                raw: RawTimeRange {
                    from: "now-1h".into(),
                    to: "now".into(),
                },
            },
        }
    }

    fn series(ref_id: &str, mins: &[i64]) -> Frame {
        let times: Vec<Timestamp> = mins.iter().map(|m| minutes(*m)).collect();
        let values = mins.iter().map(|m| Some(Variant::Integer(*m))).collect();
        Frame::assemble(
            "Pump-1",
            &times,
            &[sitewise_framer::Column::new(
                "Temperature",
                sitewise_framer::ColumnType::Integer,
                values,
            )],
        )
        .unwrap()
        .with_ref_id(ref_id)
    }

    fn minutes_of(frame: &Frame) -> Vec<i64> {
        frame
            .column("Temperature")
            .unwrap()
            .as_primitive::<Int64Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn test_cache_round() {
        let history = SitewiseQuery::new("A", QueryType::PropertyValueHistory);
        let mut descending = SitewiseQuery::new("B", QueryType::PropertyValueHistory);
        descending.property_id = Some("p-2".into());
        descending.time_ordering = Some(TimeOrdering::Descending);
        let latest = SitewiseQuery::new("C", QueryType::PropertyValue);
        let assets = SitewiseQuery::new("D", QueryType::ListAssets);
        let targets = vec![history, descending, latest, assets];

        let mut cache = RelativeRangeCache::new();
        let first = request(0, 60, targets.clone());
        cache.set(
            &first,
            &[
                series("A", &[10, 20, 30, 40, 50, 60]),
                series("B", &[60, 50, 40, 30, 20, 10]),
                series("C", &[60]),
                series("D", &[5]),
            ],
        );
        assert_eq!(cache.len(), 1);

        let second = request(10, 70, targets);
        let cached = cache.get(&second).expect("cache miss");
        assert_eq!(cached.paginating_request.range.from, minutes(55));
        assert_eq!(cached.paginating_request.range.to, minutes(70));
        assert_eq!(cached.paginating_request.targets.len(), 3);

        assert_eq!(cached.start.len(), 4);
        assert_eq!(minutes_of(&cached.start[0]), vec![20, 30, 40, 50]);
        assert!(cached.start[1].is_empty());
        assert!(cached.start[2].is_empty());
        assert_eq!(minutes_of(&cached.start[3]), vec![5]);

        assert_eq!(cached.end.len(), 1);
        assert_eq!(minutes_of(&cached.end[0]), vec![50, 40, 30, 20]);
    }

    #[test]
    fn test_cache_skips_unmatched_frames() {
        let mut cache = RelativeRangeCache::new();
        let req = request(0, 60, vec![SitewiseQuery::new("A", QueryType::PropertyValueHistory)]);
        cache.set(&req, &[series("Z", &[1])]);
        assert!(cache.is_empty());
        let mut no_ref = series("A", &[1]);
        no_ref.ref_id = None;
        cache.set(&req, &[no_ref]);
        assert!(cache.is_empty());
        assert!(cache.get(&req).is_none());
    }
}
