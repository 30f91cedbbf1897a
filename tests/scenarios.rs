//! End-to-end scenarios (§8), driven through the real input→collector→
//! matcher→output pipeline. Input pcap fixtures are synthesized with the
//! crate's own `pcap_dump` wire format (`DLT_RAW`, linktype 101), which is
//! exactly what `PcapFileAdapter` requires — no external pcap fixture
//! files needed.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use dns_collector::config::Config;
use dns_collector::drop_reason::DropReasonSet;
use dns_collector::output::{csv::CsvEncoder, Output, OutputManager};
use dns_collector::run_pipeline;

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const LINKTYPE_RAW: u32 = 101;

fn write_pcap_header(buf: &mut Vec<u8>, snaplen: u32) {
    buf.extend_from_slice(&PCAP_MAGIC.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&4u16.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&snaplen.to_le_bytes());
    buf.extend_from_slice(&LINKTYPE_RAW.to_le_bytes());
}

fn write_pcap_record(buf: &mut Vec<u8>, ts_us: i64, data: &[u8]) {
    let secs = ts_us.div_euclid(1_000_000) as u32;
    let micros = ts_us.rem_euclid(1_000_000) as u32;
    buf.extend_from_slice(&secs.to_le_bytes());
    buf.extend_from_slice(&micros.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

fn dns_message(id: u16, qr: bool, qname: &str, qtype: u16) -> Vec<u8> {
    let mut msg = vec![0u8; 12];
    msg[0] = (id >> 8) as u8;
    msg[1] = (id & 0xff) as u8;
    msg[2] = if qr { 0x80 } else { 0x00 };
    msg[5] = 1; // qdcount
    for label in qname.split('.') {
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0);
    msg.push((qtype >> 8) as u8);
    msg.push((qtype & 0xff) as u8);
    msg.push(0);
    msg.push(1); // IN
    msg
}

fn ipv4_udp_datagram(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;
    let mut buf = vec![0u8; total_len];
    buf[0] = 0x45;
    buf[2] = (total_len >> 8) as u8;
    buf[3] = (total_len & 0xff) as u8;
    buf[8] = 64;
    buf[9] = 17;
    buf[12..16].copy_from_slice(&[10, 0, 0, 1]);
    buf[16..20].copy_from_slice(&[8, 8, 8, 8]);
    let udp = &mut buf[20..];
    udp[0] = (src_port >> 8) as u8;
    udp[1] = (src_port & 0xff) as u8;
    udp[2] = (dst_port >> 8) as u8;
    udp[3] = (dst_port & 0xff) as u8;
    udp[4] = (udp_len >> 8) as u8;
    udp[5] = (udp_len & 0xff) as u8;
    udp[8..].copy_from_slice(payload);
    buf
}

fn request_datagram(id: u16, qname: &str) -> Vec<u8> {
    ipv4_udp_datagram(5353, 53, &dns_message(id, false, qname, 1))
}

fn response_datagram(id: u16, qname: &str) -> Vec<u8> {
    ipv4_udp_datagram(53, 5353, &dns_message(id, true, qname, 1))
}

fn run_scenario(
    packets: &[(i64, Vec<u8>)],
    timeframe_length_sec: f64,
    matching_window_sec: f64,
) -> String {
    let dir = tempfile::tempdir().unwrap();
    let pcap_path = dir.path().join("in.pcap");
    let csv_path = dir.path().join("out.csv");

    let mut raw = Vec::new();
    write_pcap_header(&mut raw, 65535);
    for (ts, data) in packets {
        write_pcap_record(&mut raw, *ts, data);
    }
    std::fs::File::create(&pcap_path).unwrap().write_all(&raw).unwrap();

    let config_json = format!(
        r#"{{
            "timeframe_length_sec": {timeframe_length_sec},
            "matching_window_sec": {matching_window_sec},
            "hash_order": 4,
            "capture_limit": 65535,
            "inputs": ["{pcap}"],
            "outputs": {{ "csv": [ {{ "path_template": "{csv}" }} ] }}
        }}"#,
        pcap = pcap_path.to_str().unwrap().replace('\\', "\\\\"),
        csv = csv_path.to_str().unwrap().replace('\\', "\\\\"),
    );
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, config_json).unwrap();

    let config = Config::load(config_path.to_str().unwrap()).unwrap();
    let output = Output::new("csv[0]", &config.outputs.csv[0].common, DropReasonSet::NONE, CsvEncoder);
    let manager = OutputManager::new(vec![output], Vec::new(), Vec::new()).unwrap();

    run_pipeline(Arc::new(config), manager).unwrap();

    std::fs::read_to_string(&csv_path).unwrap_or_default()
}

fn client_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
}

#[test]
fn s1_request_and_response_match_with_expected_delay() {
    let csv = run_scenario(
        &[
            (1_000_000, request_datagram(42, "example.com")),
            (1_010_000, response_datagram(42, "example.com")),
        ],
        10.0,
        1.0,
    );
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 1, "expected one matched row, got: {csv}");
    assert!(rows[0].contains(&client_ip().to_string()));
    assert!(rows[0].ends_with(",10000,"));
}

#[test]
fn s2_response_outside_matching_window_becomes_two_orphans() {
    let csv = run_scenario(
        &[
            (1_000_000, request_datagram(42, "example.com")),
            (1_600_000, response_datagram(42, "example.com")),
        ],
        10.0,
        0.5,
    );
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 2, "expected two orphan rows, got: {csv}");
    // Neither row carries a response/delay pairing.
    for row in &rows {
        let fields: Vec<&str> = row.split(',').collect();
        assert!(fields[12].is_empty() || fields[13].is_empty());
    }
}

#[test]
fn s3_many_requests_all_match_in_order() {
    let mut packets = Vec::new();
    for id in 0..20u16 {
        let base = 1_000_000 + id as i64 * 20_000;
        packets.push((base, request_datagram(id, "bulk.test")));
        packets.push((base + 5_000, response_datagram(id, "bulk.test")));
    }
    let csv = run_scenario(&packets, 10.0, 1.0);
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 20);
    let timestamps: Vec<f64> = rows
        .iter()
        .map(|r| r.split(',').next().unwrap().parse().unwrap())
        .collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(timestamps, sorted, "rows should already be in request-timestamp order");
}

#[test]
fn s4_request_near_frame_boundary_still_matches_across_rotation() {
    // timeframe_length_sec = 1.0; request 10us before the 1s boundary,
    // response 10us into the next frame.
    let csv = run_scenario(
        &[
            (999_990, request_datagram(7, "boundary.test")),
            (1_000_010, response_datagram(7, "boundary.test")),
        ],
        1.0,
        1.0,
    );
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 1, "expected the pair to survive rotation, got: {csv}");
}

#[test]
fn s5_malformed_udp_is_dropped_and_excluded_from_csv_by_default() {
    let mut short_udp = ipv4_udp_datagram(5353, 53, &[1, 2, 3]);
    short_udp.truncate(short_udp.len() - 3); // corrupt length accounting -> bad_udp
    let csv = run_scenario(&[(1_000_000, short_udp)], 10.0, 1.0);
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert!(rows.is_empty(), "dropped packet should not reach the default-filtered csv output: {csv}");
}
