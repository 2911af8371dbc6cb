//! Device and service descriptor XML. The root device only advertises
//! `ContentDirectory` and `ConnectionManager`; there is no `AVTransport`
//! service since this server only ever serves files, it never renders them.

use uuid::Uuid;

/// A deterministic device UUID derived from `seed` (e.g. the catalog
/// database path), so the UDN survives restarts without a separate
/// persisted identity file.
pub fn generate_device_uuid(seed: &str) -> String {
    let namespace = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").expect("valid DNS namespace UUID");
    format!("uuid:{}", Uuid::new_v5(&namespace, seed.as_bytes()))
}

pub fn root_desc_xml(friendly_name: &str, device_uuid: &str, base_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0" xmlns:dlna="urn:schemas-dlna-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>{friendly_name}</friendlyName>
    <manufacturer>dms</manufacturer>
    <modelName>dms</modelName>
    <modelNumber>1.0</modelNumber>
    <UDN>{device_uuid}</UDN>
    <dlna:X_DLNADOC>DMS-1.50</dlna:X_DLNADOC>
    <presentationURL>{base_url}</presentationURL>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <SCPDURL>/ContentDirectory.xml</SCPDURL>
        <controlURL>/control/ContentDirectory</controlURL>
        <eventSubURL>/event/ContentDirectory</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <SCPDURL>/ConnectionManager.xml</SCPDURL>
        <controlURL>/control/ConnectionManager</controlURL>
        <eventSubURL>/event/ConnectionManager</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#
    )
}

pub fn content_directory_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>Browse</name></action>
    <action><name>Search</name></action>
    <action><name>GetSystemUpdateID</name></action>
    <action><name>GetSearchCapabilities</name></action>
    <action><name>GetSortCapabilities</name></action>
    <action><name>QueryStateVariable</name></action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes"><name>SystemUpdateID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>SearchCapabilities</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>SortCapabilities</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>ConnectionStatus</name><dataType>string</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#
}

pub fn connection_manager_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>GetProtocolInfo</name></action>
    <action><name>GetCurrentConnectionIDs</name></action>
    <action><name>GetCurrentConnectionInfo</name></action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes"><name>SourceProtocolInfo</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>SinkProtocolInfo</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>CurrentConnectionIDs</name><dataType>string</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_uuid_is_deterministic() {
        assert_eq!(generate_device_uuid("seed"), generate_device_uuid("seed"));
    }

    #[test]
    fn root_desc_advertises_both_services_and_no_av_transport() {
        let xml = root_desc_xml("Test DMS", "uuid:abc", "http://127.0.0.1:8200");
        assert!(xml.contains("ContentDirectory"));
        assert!(xml.contains("ConnectionManager"));
        assert!(xml.contains("Test DMS"));
        assert!(!xml.contains("AVTransport"));
        assert!(xml.contains("DMS-1.50"));
    }
}
