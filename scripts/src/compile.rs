//! Compilation of the Solidity sources with solc's standard-JSON interface

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use bunny_config::compiler::CompilerSettings;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    artifacts::{Artifact, CompilerInfo},
    constants::{PROXY_SOURCES, SOLC_COMMAND, SOLIDITY_EXTENSION},
    errors::ScriptError,
};

/// A diagnostic reported by solc
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Diagnostic {
    /// `error` or `warning`
    severity: String,
    /// The human-readable message, including source location
    formatted_message: Option<String>,
    /// The bare message
    message: String,
}

/// The bytecode object of a compiled contract
#[derive(Debug, Default, Deserialize)]
struct BytecodeOutput {
    /// The hex encoded code, without prefix
    #[serde(default)]
    object: String,
}

/// The EVM output of a compiled contract
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvmOutput {
    /// The creation code
    #[serde(default)]
    bytecode: BytecodeOutput,
    /// The runtime code
    #[serde(default)]
    deployed_bytecode: BytecodeOutput,
}

/// The output for one compiled contract
#[derive(Debug, Deserialize)]
struct ContractOutput {
    /// The contract's ABI
    abi: Value,
    /// The contract's code
    #[serde(default)]
    evm: EvmOutput,
}

/// The standard-JSON output of solc
#[derive(Debug, Deserialize)]
struct SolcOutput {
    /// Errors and warnings
    #[serde(default)]
    errors: Vec<Diagnostic>,
    /// Compiled contracts, by source path then contract name
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

/// Compile every Solidity source under `contracts_dir` and write one artifact
/// per contract into `build_dir`, returning the paths written
pub fn compile(
    contracts_dir: &Path,
    build_dir: &Path,
    solc: Option<&str>,
    settings: &CompilerSettings,
) -> Result<Vec<PathBuf>, ScriptError> {
    let solc = solc.unwrap_or(SOLC_COMMAND);
    let version = check_solc_version(solc, settings)?;

    let mut sources = collect_sources(contracts_dir)?;
    if sources.is_empty() {
        warn!("no Solidity sources found in {}", contracts_dir.display());
        return Ok(Vec::new());
    }
    sources.extend(proxy_sources(Path::new("."))?);
    info!(
        "compiling {} sources with solc {}",
        sources.len(),
        version
    );

    let input = standard_json_input(&sources, settings);
    let output = run_solc(solc, &input)?;
    let artifacts = parse_output(&output, &version)?;

    artifacts
        .iter()
        .map(|artifact| artifact.save(build_dir))
        .collect()
}

/// Check the solc at `solc` is the configured version, returning its full version string
fn check_solc_version(solc: &str, settings: &CompilerSettings) -> Result<String, ScriptError> {
    let output = Command::new(solc)
        .arg("--version")
        .output()
        .map_err(|e| ScriptError::ContractCompilation(format!("running {}: {}", solc, e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    parse_solc_version(&stdout, settings.version)
}

/// Extract the full version from `solc --version` output, requiring it to
/// be `expected`
pub fn parse_solc_version(output: &str, expected: &str) -> Result<String, ScriptError> {
    let version = output
        .lines()
        .find_map(|line| line.strip_prefix("Version: "))
        .map(str::trim)
        .unwrap_or_default();

    let matches = version
        .split('+')
        .next()
        .is_some_and(|release| release == expected);
    if !matches {
        return Err(ScriptError::CompilerVersionMismatch {
            expected: expected.to_string(),
            actual: output.trim().to_string(),
        });
    }

    Ok(version.to_string())
}

/// Every Solidity source under `dir`, as (path relative to the working
/// directory, contents) pairs sorted by path
fn collect_sources(dir: &Path) -> Result<Vec<(String, String)>, ScriptError> {
    let mut sources = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .map_err(|e| ScriptError::ContractCompilation(format!("{}: {}", dir.display(), e)))?;

        for entry in entries {
            let path = entry
                .map_err(|e| ScriptError::ContractCompilation(e.to_string()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == SOLIDITY_EXTENSION) {
                let contents = fs::read_to_string(&path).map_err(|e| {
                    ScriptError::ContractCompilation(format!("{}: {}", path.display(), e))
                })?;
                sources.push((path.to_string_lossy().replace('\\', "/"), contents));
            }
        }
    }

    sources.sort();
    Ok(sources)
}

/// The proxy sources installed under `project_root`, keyed by their path
/// relative to it. Missing sources are skipped with a warning.
fn proxy_sources(project_root: &Path) -> Result<Vec<(String, String)>, ScriptError> {
    let mut sources = Vec::new();
    for source in PROXY_SOURCES {
        let path = project_root.join(source);
        if !path.is_file() {
            warn!(
                "{} not found, proxy deployments need its artifact; install @openzeppelin/contracts",
                source
            );
            continue;
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ContractCompilation(format!("{}: {}", path.display(), e)))?;
        sources.push((source.to_string(), contents));
    }

    Ok(sources)
}

/// Build the standard-JSON input for `sources`
pub fn standard_json_input(sources: &[(String, String)], settings: &CompilerSettings) -> Value {
    let sources: serde_json::Map<String, Value> = sources
        .iter()
        .map(|(path, contents)| (path.clone(), json!({ "content": contents })))
        .collect();

    json!({
        "language": "Solidity",
        "sources": sources,
        "settings": settings.standard_json_settings(),
    })
}

/// Run solc in standard-JSON mode over `input`, returning its raw output
fn run_solc(solc: &str, input: &Value) -> Result<String, ScriptError> {
    let mut child = Command::new(solc)
        .arg("--standard-json")
        // Remapped imports are read from node_modules under the working directory
        .arg("--allow-paths")
        .arg(".")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| ScriptError::ContractCompilation(format!("running {}: {}", solc, e)))?;

    let input = serde_json::to_vec(input).map_err(|e| ScriptError::Serde(e.to_string()))?;
    child
        .stdin
        .take()
        .ok_or_else(|| ScriptError::ContractCompilation("solc stdin unavailable".to_string()))?
        .write_all(&input)
        .map_err(|e| ScriptError::ContractCompilation(e.to_string()))?;

    let output = child
        .wait_with_output()
        .map_err(|e| ScriptError::ContractCompilation(e.to_string()))?;
    if !output.status.success() {
        return Err(ScriptError::ContractCompilation(format!(
            "solc exited with {}",
            output.status
        )));
    }

    String::from_utf8(output.stdout).map_err(|e| ScriptError::ContractCompilation(e.to_string()))
}

/// Turn solc's standard-JSON output into artifacts, failing on any error diagnostic
pub fn parse_output(output: &str, version: &str) -> Result<Vec<Artifact>, ScriptError> {
    let output: SolcOutput =
        serde_json::from_str(output).map_err(|e| ScriptError::Serde(e.to_string()))?;

    let mut errors = Vec::new();
    for diagnostic in &output.errors {
        let message = diagnostic
            .formatted_message
            .as_deref()
            .unwrap_or(&diagnostic.message);
        if diagnostic.severity == "error" {
            errors.push(message.trim().to_string());
        } else {
            warn!("{}", message.trim());
        }
    }
    if !errors.is_empty() {
        return Err(ScriptError::ContractCompilation(errors.join("\n")));
    }

    let mut artifacts = Vec::new();
    let mut defined_in: BTreeMap<String, String> = BTreeMap::new();
    for (source_path, contracts) in output.contracts {
        for (contract_name, contract) in contracts {
            // Artifacts are stored by contract name alone
            if let Some(first) = defined_in.insert(contract_name.clone(), source_path.clone()) {
                return Err(ScriptError::ContractCompilation(format!(
                    "contract {} is defined in both {} and {}",
                    contract_name, first, source_path
                )));
            }

            let abi = serde_json::from_value(contract.abi).map_err(|e| {
                ScriptError::ArtifactParsing(format!("{} ABI: {}", contract_name, e))
            })?;

            artifacts.push(Artifact {
                contract_name,
                source_path: Some(source_path.clone()),
                abi,
                bytecode: format!("0x{}", contract.evm.bytecode.object),
                deployed_bytecode: format!("0x{}", contract.evm.deployed_bytecode.object),
                compiler: Some(CompilerInfo {
                    name: SOLC_COMMAND.to_string(),
                    version: version.to_string(),
                }),
            });
        }
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use bunny_config::compiler::SOLC;

    use super::*;

    #[test]
    fn test_parse_solc_version() {
        let output = "solc, the solidity compiler commandline interface\n\
                      Version: 0.6.12+commit.27d51765.Linux.g++\n";
        assert_eq!(
            parse_solc_version(output, "0.6.12").unwrap(),
            "0.6.12+commit.27d51765.Linux.g++"
        );

        let newer = "Version: 0.8.20+commit.a1b79de6.Linux.g++\n";
        assert!(matches!(
            parse_solc_version(newer, "0.6.12"),
            Err(ScriptError::CompilerVersionMismatch { .. })
        ));
        assert!(parse_solc_version("", "0.6.12").is_err());
    }

    #[test]
    fn test_standard_json_input() {
        let sources = vec![(
            "contracts/BunnyMinterV2.sol".to_string(),
            "pragma solidity 0.6.12;".to_string(),
        )];
        let input = standard_json_input(&sources, &SOLC);

        assert_eq!(input["language"], "Solidity");
        assert_eq!(
            input["sources"]["contracts/BunnyMinterV2.sol"]["content"],
            "pragma solidity 0.6.12;"
        );
        assert_eq!(input["settings"]["evmVersion"], "istanbul");
        assert_eq!(input["settings"]["optimizer"]["runs"], 200);
    }

    #[test]
    fn test_parse_output() {
        let output = r#"{
            "errors": [
                {"severity": "warning", "message": "unused variable", "formattedMessage": "Warning: unused variable"}
            ],
            "contracts": {
                "contracts/BunnyMinterV2.sol": {
                    "BunnyMinterV2": {
                        "abi": [{"type": "function", "name": "initialize", "inputs": [], "outputs": [], "stateMutability": "nonpayable"}],
                        "evm": {
                            "bytecode": {"object": "6080604052"},
                            "deployedBytecode": {"object": "60806040"}
                        }
                    }
                }
            }
        }"#;

        let artifacts = parse_output(output, "0.6.12+commit.27d51765").unwrap();
        assert_eq!(artifacts.len(), 1);

        let artifact = &artifacts[0];
        assert_eq!(artifact.contract_name, "BunnyMinterV2");
        assert_eq!(
            artifact.source_path.as_deref(),
            Some("contracts/BunnyMinterV2.sol")
        );
        assert_eq!(artifact.bytecode, "0x6080604052");
        assert_eq!(artifact.deployed_bytecode, "0x60806040");
        assert!(artifact.abi.function("initialize").is_some());
    }

    #[test]
    fn test_parse_output_errors() {
        let output = r#"{
            "errors": [
                {"severity": "error", "message": "Expected ';'", "formattedMessage": "ParserError: Expected ';'"}
            ]
        }"#;

        let res = parse_output(output, "0.6.12");
        assert!(
            matches!(res, Err(ScriptError::ContractCompilation(msg)) if msg.contains("Expected ';'"))
        );
    }

    #[test]
    fn test_parse_output_duplicate_names() {
        let output = r#"{
            "contracts": {
                "contracts/access/Ownable.sol": {
                    "Ownable": {"abi": [], "evm": {"bytecode": {"object": "6001"}}}
                },
                "contracts/legacy/Ownable.sol": {
                    "Ownable": {"abi": [], "evm": {"bytecode": {"object": "6002"}}}
                }
            }
        }"#;

        let res = parse_output(output, "0.6.12");
        assert!(matches!(
            res,
            Err(ScriptError::ContractCompilation(msg))
                if msg.contains("contracts/access/Ownable.sol")
                    && msg.contains("contracts/legacy/Ownable.sol")
        ));
    }

    #[test]
    fn test_collect_sources() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("interfaces");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("BunnyMinterV2.sol"), "contract A {}").unwrap();
        fs::write(nested.join("IBunnyMinter.sol"), "interface B {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let sources = collect_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].0.ends_with("BunnyMinterV2.sol"));
        assert!(sources[1].0.ends_with("interfaces/IBunnyMinter.sol"));
    }

    #[test]
    fn test_proxy_sources() {
        let root = tempfile::tempdir().unwrap();
        assert!(proxy_sources(root.path()).unwrap().is_empty());

        for source in PROXY_SOURCES {
            let path = root.path().join(source);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "pragma solidity ^0.6.0;").unwrap();
        }

        let sources = proxy_sources(root.path()).unwrap();
        let paths = sources.iter().map(|(path, _)| path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, PROXY_SOURCES);

        // Keyed the way solc resolves a remapped `@openzeppelin/` import
        let input = standard_json_input(&sources, &SOLC);
        assert!(input["sources"]
            ["node_modules/@openzeppelin/contracts/proxy/ProxyAdmin.sol"]
            .is_object());
    }
}
