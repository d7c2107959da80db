pub mod jsonl_recording;
