use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;

/// 存储区域的域名信息
///
/// 合法的区域名称有 z0、z1、z2、as0、na0，
/// 分别表示华东、华北、华南、东南亚、北美
#[derive(Clone, Debug, Default)]
pub struct Region {
    /// 区域名称
    pub name: &'static str,

    /// 上传入口域名
    pub src_up_hosts: &'static [&'static str],

    /// 加速上传入口域名
    pub cdn_up_hosts: &'static [&'static str],

    /// 对象元信息入口域名
    pub rs_host: &'static str,

    /// 对象列举入口域名
    pub rsf_host: &'static str,

    /// API 入口域名
    pub api_host: &'static str,

    /// 下载入口域名
    pub iovip_host: &'static str,
}

static REGIONS: Lazy<HashMap<&'static str, Region>> = Lazy::new(|| {
    let mut regions = HashMap::new();
    regions.insert(
        "z0",
        Region {
            name: "z0",
            src_up_hosts: &["up.qiniup.com", "up-nb.qiniup.com", "up-xs.qiniup.com"],
            cdn_up_hosts: &["upload.qiniup.com", "upload-nb.qiniup.com", "upload-xs.qiniup.com"],
            rs_host: "rs.qbox.me",
            rsf_host: "rsf.qbox.me",
            api_host: "api.qiniu.com",
            iovip_host: "iovip.qbox.me",
        },
    );
    regions.insert(
        "z1",
        Region {
            name: "z1",
            src_up_hosts: &["up-z1.qiniup.com"],
            cdn_up_hosts: &["upload-z1.qiniup.com"],
            rs_host: "rs-z1.qbox.me",
            rsf_host: "rsf-z1.qbox.me",
            api_host: "api-z1.qiniu.com",
            iovip_host: "iovip-z1.qbox.me",
        },
    );
    regions.insert(
        "z2",
        Region {
            name: "z2",
            src_up_hosts: &["up-z2.qiniup.com", "up-gz.qiniup.com", "up-fs.qiniup.com"],
            cdn_up_hosts: &["upload-z2.qiniup.com", "upload-gz.qiniup.com", "upload-fs.qiniup.com"],
            rs_host: "rs-z2.qbox.me",
            rsf_host: "rsf-z2.qbox.me",
            api_host: "api-z2.qiniu.com",
            iovip_host: "",
        },
    );
    regions.insert(
        "as0",
        Region {
            name: "as0",
            src_up_hosts: &["up-as0.qiniup.com"],
            cdn_up_hosts: &["upload-as0.qiniup.com"],
            rs_host: "rs-as0.qbox.me",
            rsf_host: "rsf-as0.qbox.me",
            api_host: "api-as0.qiniu.com",
            iovip_host: "iovip-as0.qbox.me",
        },
    );
    regions.insert(
        "na0",
        Region {
            name: "na0",
            src_up_hosts: &["up-na0.qiniup.com"],
            cdn_up_hosts: &["upload-na0.qiniup.com"],
            rs_host: "rs-na0.qbox.me",
            rsf_host: "rsf-na0.qbox.me",
            api_host: "api-na0.qiniu.com",
            iovip_host: "iovip-na0.qbox.me",
        },
    );
    regions
});

/// 按区域名称返回内置的区域信息，未知的名称返回 `None`
pub fn get_default_region(name: &str) -> Option<&'static Region> {
    REGIONS.get(name)
}

/// 一组域名，分为主域名列表和备用域名列表
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DomainGroup {
    /// 主域名列表
    #[serde(default)]
    pub main: Vec<String>,

    /// 备用域名列表
    #[serde(default)]
    pub backup: Vec<String>,
}

impl DomainGroup {
    /// 主域名列表是否为空
    pub fn is_main_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// 主域名和备用域名列表是否都为空
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.backup.is_empty()
    }
}

/// 上传域名组
///
/// src 是普通上传域名组，acc 是加速上传域名组，
/// old_src 和 old_acc 是对应的旧版域名组
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpDomainGroup {
    /// 普通上传域名组
    #[serde(default)]
    pub src: DomainGroup,

    /// 加速上传域名组
    #[serde(default)]
    pub acc: DomainGroup,

    /// 旧版普通上传域名组
    #[serde(default, rename = "old_src")]
    pub old_src: DomainGroup,

    /// 旧版加速上传域名组
    #[serde(default, rename = "old_acc")]
    pub old_acc: DomainGroup,
}

impl UpDomainGroup {
    /// 所有上传域名组是否都为空
    pub fn is_empty(&self) -> bool {
        self.src.is_empty() && self.acc.is_empty() && self.old_src.is_empty() && self.old_acc.is_empty()
    }

    /// 从域名组中选出一组可用的上传域名
    ///
    /// 偏好顺序：加速域名组、普通域名组、旧版加速域名组、旧版普通域名组
    pub fn select_up_domain_group(&self) -> DomainGroup {
        if !self.acc.is_empty() {
            return self.acc.clone();
        }
        if !self.src.is_empty() {
            return self.src.clone();
        }
        if !self.old_acc.is_empty() {
            return self.old_acc.clone();
        }
        self.old_src.clone()
    }
}

/// 单个区域的入口域名信息
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegionDomain {
    /// 上传域名组
    #[serde(default)]
    pub up: UpDomainGroup,

    /// 下载域名组
    #[serde(default)]
    pub io: HashMap<String, DomainGroup>,
}

/// 存储空间相关的各区域入口域名信息，`v3/query` 接口的应答
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegionDomains {
    /// 各区域的入口域名
    #[serde(default)]
    pub hosts: Vec<RegionDomain>,
}

impl RegionDomains {
    /// 所有区域的上传域名组是否都为空
    pub fn all_up_domain_group_empty(&self) -> bool {
        self.hosts.iter().all(|host| host.up.is_empty())
    }

    /// 从各区域中选出第一组主域名非空的上传域名
    pub fn select_up_domain_group(&self) -> DomainGroup {
        for host in self.hosts.iter() {
            if !host.up.is_empty() {
                let group = host.up.select_up_domain_group();
                if !group.is_main_empty() {
                    return group;
                }
            }
        }
        DomainGroup::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regions() {
        let region = get_default_region("z0").unwrap();
        assert_eq!(region.src_up_hosts[0], "up.qiniup.com");
        assert!(get_default_region("z9").is_none());
        for name in ["z0", "z1", "z2", "as0", "na0"] {
            assert!(get_default_region(name).is_some());
        }
    }

    #[test]
    fn test_select_up_domain_group_preference() {
        let domains: RegionDomains = serde_json::from_str(
            r#"{
                "hosts": [{
                    "up": {
                        "src": {"main": ["up.qiniup.com"], "backup": ["up-bak.qiniup.com"]},
                        "acc": {"main": ["upload.qiniup.com"]},
                        "old_src": {"main": ["old-up.qiniup.com"]}
                    }
                }]
            }"#,
        )
        .unwrap();
        let group = domains.select_up_domain_group();
        assert_eq!(group.main, vec!["upload.qiniup.com"]);
    }

    #[test]
    fn test_select_up_domain_group_falls_back_across_hosts() {
        let domains: RegionDomains = serde_json::from_str(
            r#"{
                "hosts": [
                    {"up": {}},
                    {"up": {"src": {"main": ["up-z1.qiniup.com"]}}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(domains.select_up_domain_group().main, vec!["up-z1.qiniup.com"]);
        assert!(!domains.all_up_domain_group_empty());

        let empty: RegionDomains = serde_json::from_str(r#"{"hosts": []}"#).unwrap();
        assert!(empty.all_up_domain_group_empty());
        assert!(empty.select_up_domain_group().main.is_empty());
    }
}
