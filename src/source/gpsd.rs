use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::error::LocationError;
use super::filter::SampleFilter;
use super::sample::LocationSample;
use super::{LocationEvent, LocationSource, Subscription, WatchOptions};

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

pub struct GpsdSource {
    address: String,
    reconnect_delay: Duration,
}

impl GpsdSource {
    pub fn new(address: impl Into<String>, reconnect_delay: Duration) -> Self {
        GpsdSource {
            address: address.into(),
            reconnect_delay,
        }
    }
}

impl LocationSource for GpsdSource {
    fn subscribe(&self, options: &WatchOptions) -> Subscription {
        let (tx, rx) = Subscription::channel();
        let producer = tokio::spawn(watch_gpsd(
            self.address.clone(),
            self.reconnect_delay,
            options.clone(),
            tx,
        ));
        Subscription::new(rx, Some(producer))
    }
}

async fn watch_gpsd(
    address: String,
    reconnect_delay: Duration,
    options: WatchOptions,
    tx: mpsc::Sender<LocationEvent>,
) {
    // gpsd reports about once a second, so the nominal interval is the spacing.
    let mut filter = SampleFilter::new(options.distance_filter_m, options.interval);

    loop {
        let err = match stream_reports(&address, &options, &mut filter, &tx).await {
            Ok(()) => LocationError::Disconnected,
            Err(e) => e,
        };
        if tx.is_closed() {
            return;
        }

        log::warn!(
            "gpsd at {}: {}, reconnecting in {}",
            address,
            err,
            humantime::format_duration(reconnect_delay)
        );
        if tx.send(Err(err)).await.is_err() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn stream_reports(
    address: &str,
    options: &WatchOptions,
    filter: &mut SampleFilter,
    tx: &mpsc::Sender<LocationEvent>,
) -> Result<(), LocationError> {
    let unavailable = |e: std::io::Error| LocationError::Unavailable(e.to_string());

    let stream = TcpStream::connect(address).await.map_err(unavailable)?;
    let (read, mut write) = stream.into_split();
    write.write_all(WATCH_COMMAND).await.map_err(unavailable)?;
    log::info!("Watching gpsd at {}", address);

    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await.map_err(unavailable)? {
        let event = match parse_report(&line, options.high_accuracy) {
            Ok(Some(sample)) if filter.accept(&sample) => Ok(sample),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    time: Option<DateTime<Utc>>,
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    #[serde(rename = "altMSL")]
    alt_msl: Option<f64>,
    #[serde(rename = "altHAE")]
    alt_hae: Option<f64>,
    speed: Option<f64>,
    track: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
}

/// Turns one line of gpsd JSON into a sample. Non-TPV reports and fixes
/// below the required quality yield `Ok(None)`.
fn parse_report(line: &str, high_accuracy: bool) -> Result<Option<LocationSample>, LocationError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| LocationError::Malformed(e.to_string()))?;
    if value.get("class").and_then(|c| c.as_str()) != Some("TPV") {
        return Ok(None);
    }

    let tpv: Tpv =
        serde_json::from_value(value).map_err(|e| LocationError::Malformed(e.to_string()))?;

    let min_mode = if high_accuracy { 3 } else { 2 };
    if tpv.mode < min_mode {
        return Ok(None);
    }
    let (Some(latitude), Some(longitude)) = (tpv.lat, tpv.lon) else {
        return Ok(None);
    };

    let accuracy = tpv
        .eph
        .or_else(|| match (tpv.epx, tpv.epy) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        })
        .unwrap_or(0.0);

    let sample = LocationSample {
        latitude,
        longitude,
        accuracy,
        altitude: tpv.alt_msl.or(tpv.alt).or(tpv.alt_hae),
        speed: tpv.speed,
        heading: tpv.track,
        observed_at: tpv.time.unwrap_or_else(Utc::now),
    };

    if !sample.is_valid() {
        return Err(LocationError::Malformed(format!(
            "fix out of range: {}, {}",
            latitude, longitude
        )));
    }
    Ok(Some(sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const FIX_3D: &str = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2024-05-01T12:00:00.000Z","lat":55.75,"lon":37.61,"altMSL":150.5,"speed":1.5,"track":90.0,"epx":4.0,"epy":6.0}"#;
    const FIX_2D: &str = r#"{"class":"TPV","mode":2,"lat":55.75,"lon":37.61,"eph":12.0}"#;

    #[test]
    fn parses_three_dimensional_fix() {
        let sample = parse_report(FIX_3D, true).expect("parse").expect("sample");
        assert_eq!(sample.latitude, 55.75);
        assert_eq!(sample.longitude, 37.61);
        assert_eq!(sample.accuracy, 6.0);
        assert_eq!(sample.altitude, Some(150.5));
        assert_eq!(sample.speed, Some(1.5));
        assert_eq!(sample.heading, Some(90.0));
        assert_eq!(sample.observed_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn high_accuracy_requires_three_dimensional_fix() {
        assert!(parse_report(FIX_2D, true).expect("parse").is_none());

        let sample = parse_report(FIX_2D, false).expect("parse").expect("sample");
        assert_eq!(sample.accuracy, 12.0);
        assert_eq!(sample.altitude, None);
    }

    #[test]
    fn other_report_classes_are_ignored() {
        let version = r#"{"class":"VERSION","release":"3.25","proto_major":3,"proto_minor":15}"#;
        assert!(parse_report(version, true).expect("parse").is_none());
        assert!(parse_report("", true).expect("parse").is_none());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_report("{\"class\":", true),
            Err(LocationError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn streams_fixes_and_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.expect("read watch");
            assert!(std::str::from_utf8(&buf[..n]).expect("utf8").starts_with("?WATCH="));

            let version = r#"{"class":"VERSION","release":"3.25"}"#;
            for line in [version, FIX_3D] {
                socket.write_all(line.as_bytes()).await.expect("write");
                socket.write_all(b"\n").await.expect("write");
            }
        });

        let source = GpsdSource::new(address, Duration::from_secs(60));
        let mut sub = source.subscribe(&WatchOptions::default());

        let sample = sub.next().await.expect("event").expect("sample");
        assert_eq!(sample.latitude, 55.75);

        server.await.expect("server");
        let event = sub.next().await.expect("event");
        assert!(matches!(event, Err(LocationError::Disconnected)));

        sub.cancel();
    }

    #[tokio::test]
    async fn unreachable_daemon_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let source = GpsdSource::new(address, Duration::from_secs(60));
        let mut sub = source.subscribe(&WatchOptions::default());

        let event = sub.next().await.expect("event");
        assert!(matches!(event, Err(LocationError::Unavailable(_))));
    }
}
